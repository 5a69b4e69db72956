//! Editing workflows on top of the parcel registry: subdividing one parcel
//! along split lines and consolidating several into one.

pub mod consolidate;
pub mod lock;
pub mod subdivide;
pub mod workbench;

#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
pub(crate) mod test_fakes;

pub use consolidate::ConsolidateSession;
pub use lock::{EditState, ParcelLockController};
pub use subdivide::SubdivideSession;
pub use workbench::EditorWorkbench;
