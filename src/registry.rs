use crate::config::RetryPolicy;
use crate::errors::{EditError, ServiceError};
use crate::map_surface::MapSurface;
use crate::models::{Parcel, TableRef};
use dashmap::DashMap;
use std::future::Future;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ParcelStyle {
    #[default]
    Default,
    /// Picked as the subdivision target.
    Candidate,
    /// Part of a consolidation selection.
    Selected,
    /// Freshly created by a commit.
    Highlighted,
}

/// Where a registry reloads a table from.
pub trait TableSource: Send + Sync {
    fn load_table(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = Result<Vec<Parcel>, ServiceError>> + Send;
}

/// The set of parcels currently rendered on the map.
pub trait ParcelRegistry: Send + Sync {
    fn list_all(&self) -> Vec<Parcel>;

    fn find(&self, identifier: &str) -> Option<Parcel> {
        self.list_all()
            .into_iter()
            .find(|p| p.identifier == identifier)
    }

    fn identifiers(&self) -> Vec<String> {
        self.list_all().into_iter().map(|p| p.identifier).collect()
    }

    /// Re-fetches `table` and replaces every entry belonging to it.
    fn reload(&self, table: &TableRef) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn remove(&self, table: &TableRef, identifiers: &[String]);

    fn set_style(&self, identifier: &str, style: ParcelStyle);

    fn reset_styles(&self);

    /// Styles the parcel as highlighted and brings it into view.
    /// Returns false if no such parcel is loaded.
    fn highlight(&self, identifier: &str) -> bool;
}

/// Parcel registry backed by concurrent maps, refilled from a [`TableSource`].
pub struct LiveParcelRegistry<S> {
    source: S,
    map: MapSurface,
    parcels: DashMap<(TableRef, String), Parcel>,
    styles: DashMap<String, ParcelStyle>,
}

impl<S: TableSource> LiveParcelRegistry<S> {
    pub fn new(source: S, map: MapSurface) -> Self {
        Self {
            source,
            map,
            parcels: DashMap::new(),
            styles: DashMap::new(),
        }
    }

    pub fn insert(&self, parcel: Parcel) {
        self.parcels
            .insert((parcel.table(), parcel.identifier.clone()), parcel);
    }

    pub fn extend(&self, parcels: impl IntoIterator<Item = Parcel>) {
        for parcel in parcels {
            self.insert(parcel);
        }
    }

    pub fn style_of(&self, identifier: &str) -> ParcelStyle {
        self.styles
            .get(identifier)
            .map(|s| *s)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: TableSource> ParcelRegistry for LiveParcelRegistry<S> {
    fn list_all(&self) -> Vec<Parcel> {
        self.parcels.iter().map(|e| e.value().clone()).collect()
    }

    fn find(&self, identifier: &str) -> Option<Parcel> {
        self.parcels
            .iter()
            .find(|e| e.key().1 == identifier)
            .map(|e| e.value().clone())
    }

    #[tracing::instrument(skip(self), fields(table = %table))]
    async fn reload(&self, table: &TableRef) -> Result<(), ServiceError> {
        let fresh = self.source.load_table(table).await?;

        self.parcels.retain(|(t, _), _| t != table);
        let count = fresh.len();
        self.extend(fresh);

        tracing::info!("reloaded {} parcels", count);
        Ok(())
    }

    fn remove(&self, table: &TableRef, identifiers: &[String]) {
        for identifier in identifiers {
            self.parcels.remove(&(table.clone(), identifier.clone()));
            self.styles.remove(identifier);
        }
    }

    fn set_style(&self, identifier: &str, style: ParcelStyle) {
        if style == ParcelStyle::Default {
            self.styles.remove(identifier);
        } else {
            self.styles.insert(identifier.to_string(), style);
        }
    }

    fn reset_styles(&self) {
        self.styles.clear();
    }

    fn highlight(&self, identifier: &str) -> bool {
        let Some(parcel) = self.find(identifier) else {
            return false;
        };

        self.set_style(identifier, ParcelStyle::Highlighted);
        if let Some(geometry) = &parcel.geometry {
            self.map.fit_polygon(geometry);
        }
        true
    }
}

/// Highlights `identifier` once it shows up in `table`, reloading the table
/// between attempts. The backend may not expose a just-written parcel on the
/// first read.
pub async fn highlight_when_present<R: ParcelRegistry>(
    registry: &R,
    table: &TableRef,
    identifier: &str,
    policy: RetryPolicy,
) -> Result<(), EditError> {
    highlight_all_when_present(registry, table, &[identifier.to_string()], policy).await
}

/// Waits until every one of `identifiers` is loaded, then highlights them
/// all. One bounded wait covers the whole set; the timeout names the first
/// identifier still missing.
pub async fn highlight_all_when_present<R: ParcelRegistry>(
    registry: &R,
    table: &TableRef,
    identifiers: &[String],
    policy: RetryPolicy,
) -> Result<(), EditError> {
    let mut missing = identifiers.first().cloned();

    for attempt in 1..=policy.max_attempts {
        missing = identifiers
            .iter()
            .find(|id| registry.find(id).is_none())
            .cloned();

        if missing.is_none() {
            for identifier in identifiers {
                registry.highlight(identifier);
            }
            tracing::debug!(?identifiers, attempt, "highlighted new parcels");
            return Ok(());
        }

        if attempt == policy.max_attempts {
            break;
        }

        tokio::time::sleep(policy.delay).await;
        if let Err(e) = registry.reload(table).await {
            tracing::warn!("reload while waiting for {:?} failed: {}", missing, e);
        }
    }

    Err(EditError::ConsistencyTimeout {
        identifier: missing.unwrap_or_default(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedSource {
        loads: Mutex<Vec<Vec<Parcel>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(mut loads: Vec<Vec<Parcel>>) -> Self {
            loads.reverse();
            Self {
                loads: Mutex::new(loads),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TableSource for ScriptedSource {
        async fn load_table(&self, _table: &TableRef) -> Result<Vec<Parcel>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut loads = self.loads.lock().unwrap();
            Ok(loads.pop().unwrap_or_default())
        }
    }

    fn table() -> TableRef {
        TableRef::new("Municipality", "ParcelsBrgy1")
    }

    fn parcel(pin: &str) -> Parcel {
        Parcel::new(pin, None, &table())
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn reload_replaces_only_that_table() {
        let other = TableRef::new("Municipality", "ParcelsBrgy2");
        let source = ScriptedSource::new(vec![vec![parcel("1-1-1-1-005")]]);
        let registry = LiveParcelRegistry::new(source, MapSurface::detached());

        registry.insert(parcel("1-1-1-1-001"));
        registry.insert(Parcel::new("2-2-2-2-001", None, &other));

        registry.reload(&table()).await.unwrap();

        let mut pins = registry.identifiers();
        pins.sort();
        assert_eq!(pins, vec!["1-1-1-1-005", "2-2-2-2-001"]);
    }

    #[test]
    fn default_style_is_implicit() {
        let registry = LiveParcelRegistry::new(ScriptedSource::new(vec![]), MapSurface::detached());
        registry.set_style("A", ParcelStyle::Selected);
        assert_eq!(registry.style_of("A"), ParcelStyle::Selected);
        registry.set_style("A", ParcelStyle::Default);
        assert_eq!(registry.style_of("A"), ParcelStyle::Default);
    }

    #[tokio::test]
    async fn waits_for_late_parcel() {
        let source = ScriptedSource::new(vec![vec![], vec![parcel("1-1-1-1-009")]]);
        let registry = LiveParcelRegistry::new(source, MapSurface::detached());

        highlight_when_present(&registry, &table(), "1-1-1-1-009", quick())
            .await
            .unwrap();

        assert_eq!(registry.style_of("1-1-1-1-009"), ParcelStyle::Highlighted);
        assert_eq!(registry.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_cap() {
        let registry = LiveParcelRegistry::new(ScriptedSource::new(vec![]), MapSurface::detached());

        let err = highlight_when_present(&registry, &table(), "nope", quick())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EditError::ConsistencyTimeout {
                identifier: "nope".into(),
                attempts: 3
            }
        );
        assert_eq!(registry.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn highlights_nothing_until_the_whole_set_is_loaded() {
        let source = ScriptedSource::new(vec![
            vec![parcel("1-1-1-1-003")],
            vec![parcel("1-1-1-1-003"), parcel("1-1-1-1-004")],
        ]);
        let registry = LiveParcelRegistry::new(source, MapSurface::detached());
        let wanted = vec!["1-1-1-1-003".to_string(), "1-1-1-1-004".to_string()];

        highlight_all_when_present(&registry, &table(), &wanted, quick())
            .await
            .unwrap();

        assert_eq!(registry.style_of("1-1-1-1-003"), ParcelStyle::Highlighted);
        assert_eq!(registry.style_of("1-1-1-1-004"), ParcelStyle::Highlighted);
        assert_eq!(registry.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_names_the_missing_parcel() {
        let source = ScriptedSource::new(vec![
            vec![parcel("1-1-1-1-003")],
            vec![parcel("1-1-1-1-003")],
        ]);
        let registry = LiveParcelRegistry::new(source, MapSurface::detached());
        let wanted = vec!["1-1-1-1-003".to_string(), "1-1-1-1-004".to_string()];

        let err = highlight_all_when_present(&registry, &table(), &wanted, quick())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EditError::ConsistencyTimeout {
                identifier: "1-1-1-1-004".into(),
                attempts: 3
            }
        );
        assert_eq!(registry.style_of("1-1-1-1-003"), ParcelStyle::Default);
    }
}
