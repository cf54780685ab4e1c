//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `timeline_builder` - Validates raw timeline payloads
//! - `playback` - Replay state machine (idle / stopped / playing)
//! - `playback_worker` - Timer-driven async worker owning the controller
//! - `marker` - Square-root marker sizing
//! - `summary_store` - Summary tree with integrity policy and terminal merging

pub mod marker;
pub mod playback;
pub mod playback_worker;
pub mod summary_store;
pub mod timeline_builder;

// Re-export commonly used types
pub use marker::{markers_at, Marker, MarkerScale};
pub use playback::{PlaybackController, PlaybackSnapshot, PlaybackStatus, TickOutcome};
pub use playback_worker::{create_playback_worker, PlaybackCmd, PlaybackHandle, PlaybackWorker};
pub use summary_store::SummaryStore;
pub use timeline_builder::TimelineBuilder;
