//! Typed errors raised by the timeline, playback and summary models

use thiserror::Error;

use crate::domain::summary::IntegrityWarning;
use crate::domain::types::SellingPointId;

/// Reasons a raw timeline payload is refused by the builder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("event bounds are empty or inverted: start_at must be before end_at")]
    InvalidBounds,

    #[error("bucket {index} is not strictly after its predecessor")]
    UnorderedBuckets { index: usize },

    #[error("selling point {selling_point_id} has {actual} cumulative values, expected {expected}")]
    ShapeMismatch { selling_point_id: SellingPointId, expected: usize, actual: usize },

    #[error("selling point {0} appears more than once in the series")]
    DuplicateSeries(SellingPointId),

    #[error(
        "cumulative series for {selling_point_id} decreases at bucket {index} ({previous} -> {current})"
    )]
    MonotonicityViolation {
        selling_point_id: SellingPointId,
        index: usize,
        previous: u64,
        current: u64,
    },

    #[error("cumulative series for {selling_point_id} is negative at bucket {index} ({value})")]
    NegativeCumulative { selling_point_id: SellingPointId, index: usize, value: i64 },
}

impl TimelineError {
    /// Data-integrity errors: the shape is right but the values are not
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            TimelineError::MonotonicityViolation { .. } | TimelineError::NegativeCumulative { .. }
        )
    }

    /// Malformed-shape errors
    pub fn is_shape(&self) -> bool {
        !self.is_integrity()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TimelineError::InvalidBounds => "invalid_bounds",
            TimelineError::UnorderedBuckets { .. } => "unordered_buckets",
            TimelineError::ShapeMismatch { .. } => "shape_mismatch",
            TimelineError::DuplicateSeries(_) => "duplicate_series",
            TimelineError::MonotonicityViolation { .. } => "monotonicity_violation",
            TimelineError::NegativeCumulative { .. } => "negative_cumulative",
        }
    }
}

/// Errors raised by the playback controller and its worker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("seek to {index} is outside [0, {len})")]
    OutOfRangeSeek { index: i64, len: usize },

    #[error("no timeline loaded")]
    NotLoaded,

    #[error("timeline rejected: {0}")]
    Timeline(#[from] TimelineError),

    #[error("playback worker stopped")]
    WorkerStopped,
}

/// Errors raised by the aggregate (summary) model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("unknown selling point {0}")]
    UnknownSellingPoint(SellingPointId),

    #[error("unknown terminal provider '{0}' (expected worldline, sumup or other)")]
    UnknownProvider(String),

    #[error("terminal label must not be empty")]
    EmptyLabel,

    #[error("summary is inconsistent: {} selling point(s) disagree with their terminals", .0.len())]
    Integrity(Vec<IntegrityWarning>),
}
