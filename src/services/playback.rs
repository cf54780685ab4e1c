//! Playback state machine for the timeline replay
//!
//! States:
//! - `Idle` - no timeline loaded
//! - `Stopped` - timeline loaded, index fixed
//! - `Playing` - index advances by one bucket per tick, wrapping to 0
//!
//! Key behaviors:
//! - `load` always lands in `Stopped` at index 0 (no index when empty)
//! - `play` on an empty timeline is a no-op
//! - `seek` rejects out-of-range indices and leaves the index unchanged
//! - seeking while playing keeps playing from the new index
//! - every load/play/pause opens a new epoch; ticks armed in an older
//!   epoch are dropped by `tick_for`

use crate::domain::error::{PlaybackError, TimelineError};
use crate::domain::timeline::{RawTimeline, Timeline};
use crate::infra::metrics::Metrics;
use crate::services::marker::{markers_at, Marker, MarkerScale};
use crate::services::timeline_builder::TimelineBuilder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Stopped,
    Playing,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
        }
    }
}

/// Result of a timer firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced(usize),
    /// Armed before the last load/play/pause; ignored
    Stale,
    NotPlaying,
}

/// Read-only view of the controller handed to renderers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub epoch: u64,
    /// None when idle or when the timeline has no buckets
    pub index: Option<usize>,
    pub len: usize,
    pub bucket: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub markers: Vec<Marker>,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Loaded, but nothing to animate
    pub fn is_empty(&self) -> bool {
        self.status != PlaybackStatus::Idle && self.len == 0
    }
}

pub struct PlaybackController {
    timeline: Option<Arc<Timeline>>,
    index: usize,
    playing: bool,
    epoch: u64,
    scale: MarkerScale,
    metrics: Option<Arc<Metrics>>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(MarkerScale::default())
    }
}

impl PlaybackController {
    pub fn new(scale: MarkerScale) -> Self {
        Self { timeline: None, index: 0, playing: false, epoch: 0, scale, metrics: None }
    }

    pub fn with_metrics(scale: MarkerScale, metrics: Arc<Metrics>) -> Self {
        Self { metrics: Some(metrics), ..Self::new(scale) }
    }

    pub fn status(&self) -> PlaybackStatus {
        match (&self.timeline, self.playing) {
            (None, _) => PlaybackStatus::Idle,
            (Some(_), false) => PlaybackStatus::Stopped,
            (Some(_), true) => PlaybackStatus::Playing,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current bucket index; None when idle or empty
    pub fn index(&self) -> Option<usize> {
        match &self.timeline {
            Some(timeline) if !timeline.is_empty() => Some(self.index),
            _ => None,
        }
    }

    /// Number of buckets in the loaded timeline (0 when idle)
    pub fn len(&self) -> usize {
        self.timeline.as_ref().map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn scale(&self) -> MarkerScale {
        self.scale
    }

    pub fn timeline(&self) -> Option<&Arc<Timeline>> {
        self.timeline.as_ref()
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Replace the timeline; lands in `Stopped` at index 0
    pub fn load(&mut self, timeline: impl Into<Arc<Timeline>>) -> u64 {
        let timeline = timeline.into();
        info!(
            buckets = %timeline.len(),
            series = %timeline.series().len(),
            previous = %self.status().as_str(),
            "playback_loaded"
        );
        self.timeline = Some(timeline);
        self.index = 0;
        self.playing = false;
        self.next_epoch()
    }

    /// Build then load. On error the current timeline and index stay active.
    pub fn try_load(
        &mut self,
        raw: RawTimeline,
        builder: &TimelineBuilder,
    ) -> Result<u64, TimelineError> {
        let timeline = builder.build(raw)?;
        Ok(self.load(timeline))
    }

    /// Returns true when the state changed
    pub fn play(&mut self) -> bool {
        if self.playing || self.is_empty() {
            return false;
        }
        self.playing = true;
        let epoch = self.next_epoch();
        debug!(index = %self.index, epoch = %epoch, "playback_play");
        true
    }

    /// Returns true when the state changed
    pub fn pause(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.playing = false;
        let epoch = self.next_epoch();
        debug!(index = %self.index, epoch = %epoch, "playback_pause");
        true
    }

    /// Play/pause affordance; returns whether playback is now running
    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
        self.playing
    }

    /// Advance one bucket, wrapping to the first after the last.
    /// No-op unless playing.
    pub fn tick(&mut self) -> Option<usize> {
        if !self.playing {
            return None;
        }
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.index = (self.index + 1) % len;
        if let Some(metrics) = &self.metrics {
            metrics.record_tick();
        }
        Some(self.index)
    }

    /// Tick from a timer armed in `epoch`
    pub fn tick_for(&mut self, epoch: u64) -> TickOutcome {
        if epoch != self.epoch {
            debug!(epoch = %epoch, current = %self.epoch, "playback_stale_tick");
            if let Some(metrics) = &self.metrics {
                metrics.record_stale_tick();
            }
            return TickOutcome::Stale;
        }
        match self.tick() {
            Some(index) => TickOutcome::Advanced(index),
            None => TickOutcome::NotPlaying,
        }
    }

    /// Absolute seek. Does not change play/pause state.
    pub fn seek(&mut self, index: i64) -> Result<usize, PlaybackError> {
        if self.timeline.is_none() {
            return Err(PlaybackError::NotLoaded);
        }
        let len = self.len();
        let target = usize::try_from(index).ok().filter(|&i| i < len);
        if let Some(metrics) = &self.metrics {
            metrics.record_seek(target.is_some());
        }
        let Some(target) = target else {
            debug!(index = %index, len = %len, "playback_seek_rejected");
            return Err(PlaybackError::OutOfRangeSeek { index, len });
        };
        self.index = target;
        Ok(target)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let Some(timeline) = &self.timeline else {
            return PlaybackSnapshot { epoch: self.epoch, ..Default::default() };
        };
        let index = self.index();
        PlaybackSnapshot {
            status: self.status(),
            epoch: self.epoch,
            index,
            len: timeline.len(),
            bucket: index.and_then(|i| timeline.bucket_at(i)),
            progress: index.and_then(|i| timeline.progress_at(i)),
            markers: index.map(|i| markers_at(timeline, i, self.scale)).unwrap_or_default(),
        }
    }
}
