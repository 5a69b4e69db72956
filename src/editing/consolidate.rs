use crate::config::RetryPolicy;
use crate::errors::{EditError, RequestKind, ServiceError, ValidationError};
use crate::geometry_service::{GeometryService, MergeRequest};
use crate::models::{AttributeRecord, Parcel, TableRef};
use crate::pin;
use crate::registry::{ParcelRegistry, ParcelStyle, highlight_when_present};
use geo_types::Polygon;
use serde_json::Value;
use std::sync::Arc;

/// Everything a merge needs, copied out of the session when the operator
/// commits. Later selection changes do not reach an outstanding merge.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeTicket {
    pub table: TableRef,
    /// The first selected parcel; its attributes seed the new record.
    pub template_identifier: String,
    pub target_identifier: String,
    pub original_identifiers: Vec<String>,
    pub geometries: Vec<Polygon<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConsolidationOutcome {
    pub table: TableRef,
    pub new_identifier: String,
    pub replaced: Vec<String>,
}

/// Attribute row for the merged parcel: the template's attributes under the
/// new PIN, with the parcel and section numbers blanked and nulls written as
/// empty strings.
pub fn merge_template(mut record: AttributeRecord, target_identifier: &str) -> AttributeRecord {
    record.insert("pin".into(), Value::String(target_identifier.to_string()));
    record.insert("parcel".into(), Value::String(String::new()));
    record.insert("section".into(), Value::String(String::new()));

    for value in record.values_mut() {
        if value.is_null() {
            *value = Value::String(String::new());
        }
    }
    record
}

/// Fetches the template row and submits the merge. Touches no session state,
/// so it can run while the operator keeps working.
pub async fn execute_merge<S: GeometryService>(
    service: &S,
    ticket: &MergeTicket,
) -> Result<String, ServiceError> {
    let record = service
        .lookup_parcel(&ticket.table.dataset, &ticket.template_identifier)
        .await?
        .ok_or_else(|| ServiceError::NotFound {
            dataset: ticket.table.dataset.clone(),
            identifier: ticket.template_identifier.clone(),
        })?;

    let request = MergeRequest {
        table: ticket.table.clone(),
        base_attributes: merge_template(record, &ticket.target_identifier),
        original_identifiers: ticket.original_identifiers.clone(),
        geometries: ticket.geometries.clone(),
    };
    service.merge(&request).await
}

/// Collects two or more parcels and merges them into one.
pub struct ConsolidateSession<R> {
    registry: Arc<R>,
    selection: Vec<Parcel>,
    target_identifier: String,
    suggestion_note: Option<String>,
    in_flight: bool,
    last_error: Option<String>,
    retry: RetryPolicy,
}

impl<R: ParcelRegistry> ConsolidateSession<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            selection: Vec::new(),
            target_identifier: String::new(),
            suggestion_note: None,
            in_flight: false,
            last_error: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn selection(&self) -> &[Parcel] {
        &self.selection
    }

    pub fn target_identifier(&self) -> &str {
        &self.target_identifier
    }

    /// Why no PIN was suggested, when none could be.
    pub fn suggestion_note(&self) -> Option<&str> {
        self.suggestion_note.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn is_selected(&self, identifier: &str) -> bool {
        self.selection.iter().any(|p| p.identifier == identifier)
    }

    /// Adds the parcel, or removes it if it is already selected. Returns
    /// whether it is selected afterwards.
    pub fn toggle_select(&mut self, parcel: Parcel) -> bool {
        if self.deselect(&parcel.identifier) {
            return false;
        }

        self.registry
            .set_style(&parcel.identifier, ParcelStyle::Selected);
        self.selection.push(parcel);
        self.refresh_suggestion();
        true
    }

    pub fn deselect(&mut self, identifier: &str) -> bool {
        let Some(index) = self
            .selection
            .iter()
            .position(|p| p.identifier == identifier)
        else {
            return false;
        };

        self.selection.remove(index);
        self.registry.set_style(identifier, ParcelStyle::Default);
        self.refresh_suggestion();
        true
    }

    /// Operator override of the suggested PIN.
    pub fn set_target_identifier(&mut self, value: impl Into<String>) {
        self.target_identifier = value.into();
    }

    fn refresh_suggestion(&mut self) {
        self.suggestion_note = None;

        let Some(first) = self.selection.first().filter(|_| self.selection.len() >= 2) else {
            self.target_identifier.clear();
            return;
        };

        let existing = self.registry.identifiers();
        match pin::suggest_next(&first.identifier, existing.iter().map(String::as_str)) {
            Some(suggestion) => self.target_identifier = suggestion,
            None => {
                self.target_identifier.clear();
                self.suggestion_note = Some(match pin::pin_prefix(&first.identifier) {
                    Some(block) => format!("Block {} has no free PIN left; enter one by hand.", block),
                    None => format!(
                        "{} is not a {}-part PIN; enter the new PIN by hand.",
                        first.identifier,
                        pin::PIN_SEGMENTS
                    ),
                });
            }
        }
    }

    fn geometries(&self) -> Vec<Polygon<f64>> {
        self.selection
            .iter()
            .filter_map(|p| p.geometry.clone())
            .collect()
    }

    pub fn commit_enabled(&self) -> bool {
        self.build_ticket().is_ok()
    }

    fn build_ticket(&self) -> Result<MergeTicket, ValidationError> {
        if self.in_flight {
            return Err(ValidationError::Busy(RequestKind::Merge));
        }
        if self.selection.len() < 2 {
            return Err(ValidationError::TooFewSelected(self.selection.len()));
        }

        let geometries = self.geometries();
        if geometries.len() < 2 {
            return Err(ValidationError::TooFewGeometries(geometries.len()));
        }

        let target = self.target_identifier.trim();
        if target.is_empty() {
            return Err(ValidationError::EmptyTargetIdentifier);
        }

        let template = &self.selection[0];
        Ok(MergeTicket {
            table: template.table(),
            template_identifier: template.identifier.clone(),
            target_identifier: target.to_string(),
            original_identifiers: self
                .selection
                .iter()
                .map(|p| p.identifier.clone())
                .collect(),
            geometries,
        })
    }

    pub fn begin_commit(&mut self) -> Result<MergeTicket, EditError> {
        match self.build_ticket() {
            Ok(ticket) => {
                self.in_flight = true;
                self.last_error = None;
                Ok(ticket)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn finish_commit(
        &mut self,
        ticket: MergeTicket,
        result: Result<String, ServiceError>,
    ) -> Result<ConsolidationOutcome, EditError> {
        self.in_flight = false;

        match result {
            Ok(new_identifier) => {
                tracing::info!(
                    "merged {:?} into {}",
                    ticket.original_identifiers,
                    new_identifier
                );
                self.clear_selection();
                self.last_error = None;
                Ok(ConsolidationOutcome {
                    table: ticket.table,
                    new_identifier,
                    replaced: ticket.original_identifiers,
                })
            }
            Err(e) => {
                tracing::warn!("merge failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Merges the selection, drops the originals from the registry and waits
    /// for the new parcel to be readable before highlighting it.
    #[tracing::instrument(skip_all)]
    pub async fn commit<S: GeometryService>(
        &mut self,
        service: &S,
    ) -> Result<ConsolidationOutcome, EditError> {
        let ticket = self.begin_commit()?;
        let result = execute_merge(service, &ticket).await;
        let outcome = self.finish_commit(ticket, result)?;

        self.registry.remove(&outcome.table, &outcome.replaced);
        if let Err(e) = self.registry.reload(&outcome.table).await {
            tracing::warn!("reload after merge failed: {}", e);
        }

        let highlighted = highlight_when_present(
            self.registry.as_ref(),
            &outcome.table,
            &outcome.new_identifier,
            self.retry,
        )
        .await;
        if let Err(e) = highlighted {
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        Ok(outcome)
    }

    fn clear_selection(&mut self) {
        for parcel in self.selection.drain(..) {
            self.registry
                .set_style(&parcel.identifier, ParcelStyle::Default);
        }
        self.target_identifier.clear();
        self.suggestion_note = None;
    }

    /// Drops the selection without contacting the backend.
    pub fn cancel(&mut self) {
        self.clear_selection();
        self.last_error = None;
    }
}
