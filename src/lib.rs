//! Interactive cadastral parcel editing: subdivision along captured split lines
//! and consolidation of selected parcels, driven against an external geometry
//! service and a shared registry of rendered parcels.

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod capture;
pub mod config;
pub mod editing;
pub mod errors;
pub mod geodesy;
pub mod geometry_service;
pub mod map_surface;
pub mod models;
pub mod pin;
pub mod registry;

pub use config::EditorConfig;
pub use editing::consolidate::ConsolidateSession;
pub use editing::lock::{EditState, ParcelLockController};
pub use editing::subdivide::SubdivideSession;
pub use editing::workbench::EditorWorkbench;
pub use errors::{EditError, ServiceError, ValidationError};
pub use models::{Parcel, PreviewPart, SplitLine, TableRef, Vertex};
