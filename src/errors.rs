use std::path::PathBuf;
use thiserror::Error;

/// Which network call a session is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Preview,
    Save,
    Merge,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Preview => write!(f, "preview"),
            RequestKind::Save => write!(f, "save"),
            RequestKind::Merge => write!(f, "merge"),
        }
    }
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum RowDefect {
    #[error("expected 2 values, found {0}")]
    WrongTokenCount(usize),
    #[error("not a number")]
    NotNumeric,
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Problems caught locally. None of these ever reach the network.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Please select a parcel to subdivide first.")]
    NoParcelSelected,
    #[error("Choose the parcel before drawing or previewing.")]
    NoParcelLocked,
    #[error("Draw at least one split line before requesting a preview.")]
    NoSplitLines,
    #[error("There is no subdivision preview to work on.")]
    NoPreview,
    #[error("Discard the preview before changing the split lines.")]
    PreviewActive,
    #[error("Preview part {0} does not exist.")]
    NoSuchPart(usize),
    #[error("Part {} needs a PIN.", .0 + 1)]
    EmptyIdentifier(usize),
    #[error("Please select at least two parcels ({0} selected).")]
    TooFewSelected(usize),
    #[error("Must have at least 2 valid geometries ({0} found).")]
    TooFewGeometries(usize),
    #[error("Enter a PIN for the consolidated parcel.")]
    EmptyTargetIdentifier,
    #[error("Invalid row {row}: \"{line}\" ({defect}). Use: lat,lng")]
    MalformedRow {
        row: usize,
        line: String,
        defect: RowDefect,
    },
    #[error("Could not read {path:?}: {reason}")]
    UnreadableImport { path: PathBuf, reason: String },
    #[error("Point {index} does not exist ({len} points).")]
    NoSuchPoint { index: usize, len: usize },
    #[error("Pick a start point on the map first.")]
    NoStartPoint,
    #[error("Distance and bearing must be finite numbers.")]
    InvalidSegment,
    #[error("Switch to {0} input to use this action.")]
    WrongCaptureMode(&'static str),
    #[error("A {0} request is already in flight.")]
    Busy(RequestKind),
}

/// Failures reported by, or while talking to, the geometry service.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ServiceError {
    /// The backend answered with an error envelope. The message is kept verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("Preview returned no parts.")]
    EmptyPreview,
    #[error("Parcel {identifier} not found in {dataset}.")]
    NotFound { dataset: String, identifier: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::MalformedResponse(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::MalformedResponse(e.to_string())
    }
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum EditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Parcel {identifier} did not appear after {attempts} lookups.")]
    ConsistencyTimeout { identifier: String, attempts: u32 },
}
