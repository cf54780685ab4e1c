//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `source` - Async trait over anything that serves events, summaries and timelines
//! - `api_client` - REST client for the sales backend
//! - `snapshot` - JSON snapshot files for offline replay

pub mod api_client;
pub mod snapshot;
pub mod source;

// Re-export commonly used types
pub use api_client::ApiClient;
pub use snapshot::SnapshotSource;
pub use source::EventSource;
