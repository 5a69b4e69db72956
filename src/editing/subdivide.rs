use super::lock::{EditState, ParcelLockController};
use crate::capture::bearing::BearingDistanceCapture;
use crate::capture::freehand::FreehandCapture;
use crate::capture::point_list::{self, PointListCapture};
use crate::capture::{CaptureMode, LineCaptureEngine};
use crate::config::RetryPolicy;
use crate::errors::{EditError, RequestKind, ServiceError, ValidationError};
use crate::geodesy::TraverseLeg;
use crate::geometry_service::{GeometryService, PreviewRequest, SaveRequest};
use crate::map_surface::{MapCommand, MapLayer, MapSurface, PartStyle};
use crate::models::{Parcel, PreviewPart, SplitLine, TableRef, Vertex};
use crate::pin;
use crate::registry::{ParcelRegistry, highlight_all_when_present};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct PreviewState {
    table: TableRef,
    base_identifier: String,
    lines: Vec<SplitLine>,
    parts: Vec<PreviewPart>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubdivisionOutcome {
    pub table: TableRef,
    pub replaced: String,
    pub new_identifiers: Vec<String>,
    pub message: String,
}

/// One subdivision from parcel pick to commit.
///
/// Network calls are split in two halves (`begin_*` builds an owned request
/// and marks the call in flight, `finish_*` applies the answer) so the
/// caller can keep feeding pointer input while a request is outstanding.
/// `request_preview` and `commit` run both halves back to back.
pub struct SubdivideSession<R> {
    registry: Arc<R>,
    map: MapSurface,
    lock: ParcelLockController,
    capture: LineCaptureEngine,
    preview: Option<PreviewState>,
    focused: Option<usize>,
    in_flight: Option<RequestKind>,
    /// Bumped per request and per reset; answers carrying an older value are stale.
    generation: u64,
    last_error: Option<String>,
    retry: RetryPolicy,
}

impl<R: ParcelRegistry> SubdivideSession<R> {
    pub fn new(registry: Arc<R>, map: MapSurface, mode: CaptureMode) -> Self {
        Self {
            registry,
            map,
            lock: ParcelLockController::new(),
            capture: LineCaptureEngine::new(mode),
            preview: None,
            focused: None,
            in_flight: None,
            generation: 0,
            last_error: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> EditState {
        self.lock.state()
    }

    pub fn parcel(&self) -> Option<&Parcel> {
        self.lock.parcel()
    }

    pub fn mode(&self) -> CaptureMode {
        self.capture.mode()
    }

    pub fn capture(&self) -> &LineCaptureEngine {
        &self.capture
    }

    pub fn lines(&self) -> Vec<SplitLine> {
        self.capture.snapshot()
    }

    pub fn parts(&self) -> &[PreviewPart] {
        self.preview.as_ref().map_or(&[], |p| p.parts.as_slice())
    }

    pub fn focused_part(&self) -> Option<usize> {
        self.focused
    }

    pub fn in_flight(&self) -> Option<RequestKind> {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<T>(&mut self, result: Result<T, EditError>) -> Result<T, EditError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                tracing::warn!("subdivide: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    pub fn select_parcel(&mut self, parcel: Parcel) -> bool {
        let accepted = self.lock.select_parcel(parcel, self.registry.as_ref());
        if accepted {
            self.last_error = None;
        }
        accepted
    }

    pub fn lock(&mut self) -> Result<(), EditError> {
        let result = self.lock.lock().map(|_| ()).map_err(EditError::from);
        self.record(result)
    }

    /// Swaps the input style. Lines captured so far are dropped.
    pub fn set_mode(&mut self, mode: CaptureMode) -> Result<(), EditError> {
        if self.preview.is_some() {
            return self.record(Err(ValidationError::PreviewActive.into()));
        }
        if self.capture.mode() != mode {
            self.capture = LineCaptureEngine::new(mode);
            self.capture.render(&self.map);
        }
        Ok(())
    }

    fn ensure_capturing(&self) -> Result<(), ValidationError> {
        match self.lock.state() {
            EditState::Locked => Ok(()),
            EditState::Previewing | EditState::Committing => Err(ValidationError::PreviewActive),
            _ => Err(ValidationError::NoParcelLocked),
        }
    }

    fn freehand(&mut self) -> Option<&mut FreehandCapture> {
        if self.ensure_capturing().is_err() {
            return None;
        }
        self.capture.freehand_mut()
    }

    fn point_list(&mut self) -> Result<&mut PointListCapture, ValidationError> {
        self.ensure_capturing()?;
        self.capture
            .point_list_mut()
            .ok_or(ValidationError::WrongCaptureMode(CaptureMode::PointList.label()))
    }

    fn bearing(&mut self) -> Result<&mut BearingDistanceCapture, ValidationError> {
        self.ensure_capturing()?;
        self.capture
            .bearing_mut()
            .ok_or(ValidationError::WrongCaptureMode(
                CaptureMode::BearingDistance.label(),
            ))
    }

    /// Left click on the map. Returns true if the click was used.
    pub fn primary_click(&mut self, at: Vertex) -> bool {
        let used = if let Some(freehand) = self.freehand() {
            freehand.push_vertex(at);
            true
        } else if let Ok(bearing) = self.bearing() {
            bearing.map_pick(at)
        } else {
            false
        };

        if used {
            self.capture.render(&self.map);
        }
        used
    }

    /// Right click: closes the line being drawn.
    pub fn secondary_click(&mut self) -> bool {
        let Some(freehand) = self.freehand() else {
            return false;
        };
        let finished = freehand.finish_line();
        self.capture.render(&self.map);
        finished
    }

    pub fn pointer_moved(&mut self, at: Vertex) {
        if let Some(freehand) = self.freehand() {
            if freehand.pointer_moved(at).is_some() {
                self.capture.render(&self.map);
            }
        }
    }

    /// Undoes the newest line, point or course depending on the mode.
    pub fn undo(&mut self) -> bool {
        if self.ensure_capturing().is_err() {
            return false;
        }
        let undone = self.capture.undo();
        if undone {
            self.capture.render(&self.map);
        }
        undone
    }

    pub fn clear_lines(&mut self) {
        if self.ensure_capturing().is_ok() {
            self.capture.clear();
            self.capture.render(&self.map);
        }
    }

    pub fn paste_points(&mut self, text: &str) -> Result<usize, EditError> {
        let result = self
            .point_list()
            .and_then(|c| c.add_text(text))
            .map_err(EditError::from);
        self.capture.render(&self.map);
        self.record(result)
    }

    pub async fn import_points(&mut self, path: &Path) -> Result<usize, EditError> {
        let result = match self.point_list() {
            Ok(c) => c.import_file(path).await.map_err(EditError::from),
            Err(e) => Err(e.into()),
        };
        self.capture.render(&self.map);
        self.record(result)
    }

    pub fn remove_point(&mut self, index: usize) -> Result<Vertex, EditError> {
        let result = self
            .point_list()
            .and_then(|c| c.remove_point(index))
            .map_err(EditError::from);
        self.capture.render(&self.map);
        self.record(result)
    }

    pub fn arm_start_pick(&mut self) -> Result<(), EditError> {
        let result = self
            .bearing()
            .map(|c| c.arm_start_pick())
            .map_err(EditError::from);
        self.record(result)
    }

    pub fn clear_start(&mut self) -> Result<(), EditError> {
        let result = self
            .bearing()
            .map(|c| c.clear_start())
            .map_err(EditError::from);
        self.capture.render(&self.map);
        self.record(result)
    }

    pub fn add_leg(&mut self, distance_m: f64, bearing_deg: f64) -> Result<Vertex, EditError> {
        let result = self
            .bearing()
            .and_then(|c| c.add_leg(TraverseLeg::new(distance_m, bearing_deg)))
            .map_err(EditError::from);
        self.capture.render(&self.map);
        self.record(result)
    }

    pub fn export_points_text(&self) -> String {
        point_list::export_text(&self.capture.vertices())
    }

    pub fn export_points_csv(&self) -> Result<String, csv::Error> {
        point_list::export_csv(&self.capture.vertices())
    }

    pub fn preview_enabled(&self) -> bool {
        self.in_flight.is_none()
            && self.lock.state() == EditState::Locked
            && self.capture.has_lines()
    }

    pub fn begin_preview(&mut self) -> Result<PreviewRequest, EditError> {
        let request = self.build_preview_request().map(|mut request| {
            self.generation = self.generation.wrapping_add(1);
            request.generation = self.generation;
            request
        });
        if request.is_ok() {
            self.in_flight = Some(RequestKind::Preview);
        }
        self.record(request.map_err(EditError::from))
    }

    fn build_preview_request(&self) -> Result<PreviewRequest, ValidationError> {
        if let Some(kind) = self.in_flight {
            return Err(ValidationError::Busy(kind));
        }
        if self.preview.is_some() {
            return Err(ValidationError::PreviewActive);
        }
        let parcel = self
            .lock
            .locked_parcel()
            .ok_or(ValidationError::NoParcelLocked)?;

        let lines = self.capture.snapshot();
        if lines.is_empty() {
            return Err(ValidationError::NoSplitLines);
        }

        Ok(PreviewRequest {
            table: parcel.table(),
            base_identifier: parcel.identifier.clone(),
            lines,
            generation: self.generation,
        })
    }

    pub fn finish_preview(
        &mut self,
        request: PreviewRequest,
        result: Result<Vec<PreviewPart>, ServiceError>,
    ) -> Result<(), EditError> {
        if self.in_flight != Some(RequestKind::Preview) || request.generation != self.generation {
            tracing::debug!(
                "dropping stale preview answer for {}",
                request.base_identifier
            );
            return Ok(());
        }
        self.in_flight = None;

        let mut parts = match result {
            Ok(parts) if parts.is_empty() => {
                return self.record(Err(ServiceError::EmptyPreview.into()));
            }
            Ok(parts) => parts,
            Err(e) => return self.record(Err(e.into())),
        };

        self.fill_missing_suggestions(&request.base_identifier, &mut parts);
        tracing::info!(
            "preview of {} has {} parts",
            request.base_identifier,
            parts.len()
        );

        // The preview replaces the raw drawings
        self.capture.clear();
        self.map.clear(MapLayer::Drawings);
        self.map.clear(MapLayer::Preview);
        for (index, part) in parts.iter().enumerate() {
            self.map.send(MapCommand::DrawPreviewPart {
                index,
                polygon: part.geometry.clone(),
            });
        }

        self.preview = Some(PreviewState {
            table: request.table,
            base_identifier: request.base_identifier,
            lines: request.lines,
            parts,
        });
        self.focused = None;
        self.lock.transition(EditState::Previewing);
        self.record(Ok(()))
    }

    /// Gives every part without a server suggestion the next free PIN in the
    /// base parcel's block, one per part.
    fn fill_missing_suggestions(&self, base_identifier: &str, parts: &mut [PreviewPart]) {
        let missing = parts
            .iter()
            .filter(|p| p.suggested_identifier.is_empty())
            .count();
        if missing == 0 {
            return;
        }

        let mut taken = self.registry.identifiers();
        taken.extend(parts.iter().map(|p| p.suggested_identifier.clone()));

        let Some(fresh) =
            pin::suggest_sequence(base_identifier, taken.iter().map(String::as_str), missing)
        else {
            return;
        };

        for (part, suggestion) in parts
            .iter_mut()
            .filter(|p| p.suggested_identifier.is_empty())
            .zip(fresh)
        {
            part.suggested_identifier = suggestion;
        }
    }

    pub async fn request_preview<S: GeometryService>(
        &mut self,
        service: &S,
    ) -> Result<(), EditError> {
        let request = self.begin_preview()?;
        let result = service.preview(&request).await;
        self.finish_preview(request, result)
    }

    /// Highlights one part and brings it into view.
    pub fn focus_part(&mut self, index: usize) -> Result<(), EditError> {
        let result = match &self.preview {
            None => Err(ValidationError::NoPreview),
            Some(p) if index >= p.parts.len() => Err(ValidationError::NoSuchPart(index)),
            Some(p) => {
                for i in 0..p.parts.len() {
                    let style = if i == index {
                        PartStyle::Focused
                    } else {
                        PartStyle::Normal
                    };
                    self.map
                        .send(MapCommand::StylePreviewPart { index: i, style });
                }
                self.map.fit_polygon(&p.parts[index].geometry);
                Ok(())
            }
        };

        if result.is_ok() {
            self.focused = Some(index);
        }
        self.record(result.map_err(EditError::from))
    }

    pub fn set_identifier(&mut self, index: usize, value: impl Into<String>) -> Result<(), EditError> {
        let result = match self.preview.as_mut() {
            None => Err(ValidationError::NoPreview),
            Some(p) => match p.parts.get_mut(index) {
                Some(part) => {
                    part.suggested_identifier = value.into();
                    Ok(())
                }
                None => Err(ValidationError::NoSuchPart(index)),
            },
        };
        self.record(result.map_err(EditError::from))
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.parts()
            .iter()
            .map(|p| p.suggested_identifier.clone())
            .collect()
    }

    pub fn commit_enabled(&self) -> bool {
        self.in_flight.is_none()
            && self.lock.state() == EditState::Previewing
            && self
                .parts()
                .iter()
                .all(|p| !p.suggested_identifier.trim().is_empty())
    }

    pub fn begin_commit(&mut self) -> Result<SaveRequest, EditError> {
        let request = self.build_save_request().map(|mut request| {
            self.generation = self.generation.wrapping_add(1);
            request.generation = self.generation;
            request
        });
        if request.is_ok() {
            self.in_flight = Some(RequestKind::Save);
            self.lock.transition(EditState::Committing);
        }
        self.record(request.map_err(EditError::from))
    }

    fn build_save_request(&self) -> Result<SaveRequest, ValidationError> {
        if let Some(kind) = self.in_flight {
            return Err(ValidationError::Busy(kind));
        }
        let preview = self.preview.as_ref().ok_or(ValidationError::NoPreview)?;

        if let Some(empty) = preview
            .parts
            .iter()
            .position(|p| p.suggested_identifier.trim().is_empty())
        {
            return Err(ValidationError::EmptyIdentifier(empty));
        }

        Ok(SaveRequest {
            table: preview.table.clone(),
            base_identifier: preview.base_identifier.clone(),
            lines: preview.lines.clone(),
            new_identifiers: preview
                .parts
                .iter()
                .map(|p| p.suggested_identifier.trim().to_string())
                .collect(),
            generation: self.generation,
        })
    }

    pub fn finish_commit(
        &mut self,
        request: SaveRequest,
        result: Result<String, ServiceError>,
    ) -> Result<SubdivisionOutcome, EditError> {
        let current =
            self.in_flight == Some(RequestKind::Save) && request.generation == self.generation;
        if current {
            self.in_flight = None;
        }

        match result {
            Ok(message) => {
                tracing::info!(
                    "subdivided {} into {:?}",
                    request.base_identifier,
                    request.new_identifiers
                );
                if current {
                    self.reset();
                }
                self.last_error = None;
                Ok(SubdivisionOutcome {
                    table: request.table,
                    replaced: request.base_identifier,
                    new_identifiers: request.new_identifiers,
                    message,
                })
            }
            Err(e) => {
                if current {
                    self.lock.transition(EditState::Previewing);
                }
                self.record(Err(e.into()))
            }
        }
    }

    /// Saves the subdivision, reloads the affected table and highlights the
    /// new parcels.
    #[tracing::instrument(skip_all)]
    pub async fn commit<S: GeometryService>(
        &mut self,
        service: &S,
    ) -> Result<SubdivisionOutcome, EditError> {
        let request = self.begin_commit()?;
        let result = service.save(&request).await;
        let outcome = self.finish_commit(request, result)?;

        if let Err(e) = self.registry.reload(&outcome.table).await {
            return self.record(Err(e.into()));
        }

        let highlighted = highlight_all_when_present(
            self.registry.as_ref(),
            &outcome.table,
            &outcome.new_identifiers,
            self.retry,
        )
        .await;
        if let Err(e) = highlighted {
            return self.record(Err(e));
        }

        Ok(outcome)
    }

    /// Drops the preview, drawings and lock. Never touches the network.
    pub fn discard(&mut self) {
        self.reset();
        self.last_error = None;
    }

    fn reset(&mut self) {
        self.map.clear(MapLayer::Preview);
        self.map.clear(MapLayer::Drawings);
        self.capture.clear();
        self.preview = None;
        self.focused = None;
        self.in_flight = None;
        self.generation = self.generation.wrapping_add(1);
        self.lock.unlock(self.registry.as_ref());
    }
}
