//! Domain models - core value types for the summary and replay views
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - identifiers, money (`Cents`), providers, locations, events
//! - `summary` - the event → selling point → terminal aggregation tree
//! - `timeline` - raw and validated bucketed cumulative series
//! - `error` - typed errors for timelines, playback and summaries

pub mod error;
pub mod summary;
pub mod timeline;
pub mod types;

// Re-export commonly used types at module level
pub use error::{PlaybackError, SummaryError, TimelineError};
pub use summary::{EptCreateRequest, EptRecord, EptSummary, EventSummary, IntegrityWarning, SellingPointSummary};
pub use timeline::{RawSeries, RawTimeline, SellingPointSeries, Timeline};
pub use types::{Cents, EptId, EptProvider, Event, EventId, GeoPoint, SellingPointId};
