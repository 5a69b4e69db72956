//! In-memory backend shared by the editing tests. It stores parcels the way
//! the real service does, so a save or merge shows up on the next reload.

use crate::errors::ServiceError;
use crate::geometry_service::{GeometryService, MergeRequest, PreviewRequest, SaveRequest};
use crate::map_surface::MapSurface;
use crate::models::{AttributeRecord, Parcel, PreviewPart, TableRef};
use crate::registry::{LiveParcelRegistry, ParcelRegistry, TableSource};
use ahash::AHashMap;
use geo_types::{Polygon, polygon};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Preview(PreviewRequest),
    Save(SaveRequest),
    Merge(MergeRequest),
    Lookup(String),
    LoadTable(TableRef),
}

#[derive(Default)]
struct Inner {
    stored: Mutex<Vec<Parcel>>,
    attributes: Mutex<AHashMap<String, AttributeRecord>>,
    calls: Mutex<Vec<Call>>,
    preview_reply: Mutex<Option<Result<Vec<PreviewPart>, ServiceError>>>,
    save_failure: Mutex<Option<ServiceError>>,
    merge_failure: Mutex<Option<ServiceError>>,
    merge_pin: Mutex<Option<String>>,
    defer_saves: Mutex<bool>,
    /// Merged parcels stay invisible for this many table loads.
    hidden_loads: Mutex<usize>,
    pending: Mutex<Vec<Parcel>>,
}

#[derive(Clone, Default)]
pub struct FakeBackend(Arc<Inner>);

pub type FakeRegistry = LiveParcelRegistry<FakeBackend>;

pub fn table() -> TableRef {
    TableRef::new("Municipality", "ParcelsBrgy1")
}

pub fn square(x: f64, y: f64) -> Polygon<f64> {
    polygon![
        (x: x, y: y),
        (x: x + 0.001, y: y),
        (x: x + 0.001, y: y + 0.001),
        (x: x, y: y + 0.001),
        (x: x, y: y),
    ]
}

pub fn parcel(pin: &str) -> Parcel {
    Parcel::new(pin, Some(square(121.0, 14.0)), &table())
}

pub fn registry() -> FakeRegistry {
    LiveParcelRegistry::new(FakeBackend::default(), MapSurface::detached())
}

/// Registry whose backing store already holds `pins`, loaded and shown.
pub async fn seeded(pins: &[&str], map: MapSurface) -> Arc<FakeRegistry> {
    let backend = FakeBackend::default();
    for pin in pins {
        backend.store(parcel(pin));
    }
    let registry = Arc::new(LiveParcelRegistry::new(backend, map));
    registry.reload(&table()).await.unwrap();
    registry
}

impl FakeBackend {
    pub fn store(&self, parcel: Parcel) {
        self.0.stored.lock().unwrap().push(parcel);
    }

    pub fn set_attributes(&self, pin: &str, record: AttributeRecord) {
        self.0
            .attributes
            .lock()
            .unwrap()
            .insert(pin.to_string(), record);
    }

    pub fn reply_to_preview(&self, reply: Result<Vec<PreviewPart>, ServiceError>) {
        *self.0.preview_reply.lock().unwrap() = Some(reply);
    }

    pub fn fail_save(&self, error: ServiceError) {
        *self.0.save_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_merge(&self, error: ServiceError) {
        *self.0.merge_failure.lock().unwrap() = Some(error);
    }

    pub fn merge_into(&self, pin: &str, hidden_loads: usize) {
        *self.0.merge_pin.lock().unwrap() = Some(pin.to_string());
        *self.0.hidden_loads.lock().unwrap() = hidden_loads;
    }

    /// Saved parts stay invisible for `hidden_loads` table loads.
    pub fn defer_saves(&self, hidden_loads: usize) {
        *self.0.defer_saves.lock().unwrap() = true;
        *self.0.hidden_loads.lock().unwrap() = hidden_loads;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.calls.lock().unwrap().clone()
    }

    pub fn network_calls(&self) -> usize {
        self.0.calls.lock().unwrap().len()
    }

    pub fn forget_calls(&self) {
        self.0.calls.lock().unwrap().clear();
    }

    fn log(&self, call: Call) {
        self.0.calls.lock().unwrap().push(call);
    }
}

pub fn parts(pins: &[&str]) -> Vec<PreviewPart> {
    pins.iter()
        .enumerate()
        .map(|(i, pin)| PreviewPart {
            geometry: square(121.0 + i as f64 * 0.001, 14.0),
            suggested_identifier: pin.to_string(),
        })
        .collect()
}

impl GeometryService for FakeBackend {
    async fn preview(&self, request: &PreviewRequest) -> Result<Vec<PreviewPart>, ServiceError> {
        self.log(Call::Preview(request.clone()));
        self.0
            .preview_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ServiceError::Rejected("No preview scripted.".into())))
    }

    async fn save(&self, request: &SaveRequest) -> Result<String, ServiceError> {
        self.log(Call::Save(request.clone()));
        if let Some(e) = self.0.save_failure.lock().unwrap().take() {
            return Err(e);
        }

        self.0
            .stored
            .lock()
            .unwrap()
            .retain(|p| p.identifier != request.base_identifier);

        let created = request
            .new_identifiers
            .iter()
            .enumerate()
            .map(|(i, pin)| {
                Parcel::new(
                    pin.as_str(),
                    Some(square(121.0 + i as f64 * 0.001, 14.0)),
                    &request.table,
                )
            });
        if *self.0.defer_saves.lock().unwrap() {
            self.0.pending.lock().unwrap().extend(created);
        } else {
            self.0.stored.lock().unwrap().extend(created);
        }
        Ok("Subdivision saved.".to_string())
    }

    async fn merge(&self, request: &MergeRequest) -> Result<String, ServiceError> {
        self.log(Call::Merge(request.clone()));
        if let Some(e) = self.0.merge_failure.lock().unwrap().take() {
            return Err(e);
        }

        let pin = self
            .0
            .merge_pin
            .lock()
            .unwrap()
            .clone()
            .or_else(|| {
                request
                    .base_attributes
                    .get("pin")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        self.0
            .stored
            .lock()
            .unwrap()
            .retain(|p| !request.original_identifiers.contains(&p.identifier));
        self.0.pending.lock().unwrap().push(Parcel::new(
            pin.as_str(),
            request.geometries.first().cloned(),
            &request.table,
        ));
        Ok(pin)
    }

    async fn lookup_parcel(
        &self,
        _dataset: &str,
        identifier: &str,
    ) -> Result<Option<AttributeRecord>, ServiceError> {
        self.log(Call::Lookup(identifier.to_string()));
        Ok(self.0.attributes.lock().unwrap().get(identifier).cloned())
    }
}

impl TableSource for FakeBackend {
    async fn load_table(&self, table: &TableRef) -> Result<Vec<Parcel>, ServiceError> {
        self.log(Call::LoadTable(table.clone()));

        {
            let mut hidden = self.0.hidden_loads.lock().unwrap();
            if *hidden > 0 {
                *hidden -= 1;
            } else {
                let mut pending = self.0.pending.lock().unwrap();
                self.0.stored.lock().unwrap().append(&mut pending);
            }
        }

        Ok(self
            .0
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.belongs_to(table))
            .cloned()
            .collect())
    }
}
