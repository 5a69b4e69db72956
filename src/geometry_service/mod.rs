//! The backend that computes and persists parcel splits and merges.

pub mod http;

use crate::errors::ServiceError;
use crate::models::{AttributeRecord, PreviewPart, SplitLine, TableRef};
use geo_types::Polygon;
use std::future::Future;

#[derive(Clone, Debug, PartialEq)]
pub struct PreviewRequest {
    pub table: TableRef,
    pub base_identifier: String,
    pub lines: Vec<SplitLine>,
    /// Session ticket; never sent on the wire.
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub table: TableRef,
    pub base_identifier: String,
    /// Same lines the preview was computed from; the backend re-splits.
    pub lines: Vec<SplitLine>,
    /// One per preview part, in part order.
    pub new_identifiers: Vec<String>,
    /// Session ticket; never sent on the wire.
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeRequest {
    pub table: TableRef,
    pub base_attributes: AttributeRecord,
    pub original_identifiers: Vec<String>,
    pub geometries: Vec<Polygon<f64>>,
}

pub trait GeometryService: Send + Sync {
    fn preview(
        &self,
        request: &PreviewRequest,
    ) -> impl Future<Output = Result<Vec<PreviewPart>, ServiceError>> + Send;

    /// Persists a subdivision. Returns the backend's confirmation message.
    fn save(&self, request: &SaveRequest)
    -> impl Future<Output = Result<String, ServiceError>> + Send;

    /// Persists a consolidation. Returns the identifier the new parcel was
    /// stored under.
    fn merge(
        &self,
        request: &MergeRequest,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;

    fn lookup_parcel(
        &self,
        dataset: &str,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<AttributeRecord>, ServiceError>> + Send;
}
