//! Lock-free playback and summary counters with periodic reporting
//!
//! Uses atomics so the playback worker and the summary store can record
//! without contention. Reporting swaps the per-interval counters and keeps
//! the monotonic totals.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are
//! statistical counters only. Do NOT use them for coordination.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

pub struct Metrics {
    /// Ticks that advanced the index (monotonic)
    ticks_total: AtomicU64,
    /// Ticks since last report (reset on report)
    ticks_since_report: AtomicU64,
    /// Ticks dropped because they were armed in an older epoch (monotonic)
    stale_ticks: AtomicU64,
    /// Seeks accepted (monotonic)
    seeks_total: AtomicU64,
    /// Seeks rejected as out of range (monotonic)
    seeks_rejected: AtomicU64,
    /// Timelines that passed validation (monotonic)
    timelines_loaded: AtomicU64,
    /// Timelines refused by the builder (monotonic)
    timelines_rejected: AtomicU64,
    /// Selling points whose total disagrees with their terminals (monotonic)
    integrity_warnings: AtomicU64,
    /// Created terminals merged into a summary (monotonic)
    epts_merged: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks_total: AtomicU64::new(0),
            ticks_since_report: AtomicU64::new(0),
            stale_ticks: AtomicU64::new(0),
            seeks_total: AtomicU64::new(0),
            seeks_rejected: AtomicU64::new(0),
            timelines_loaded: AtomicU64::new(0),
            timelines_rejected: AtomicU64::new(0),
            integrity_warnings: AtomicU64::new(0),
            epts_merged: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_tick(&self) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        self.ticks_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_tick(&self) {
        self.stale_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_seek(&self, accepted: bool) {
        if accepted {
            self.seeks_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.seeks_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_timeline_loaded(&self) {
        self.timelines_loaded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeline_rejected(&self) {
        self.timelines_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_integrity_warnings(&self, count: u64) {
        self.integrity_warnings.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ept_merged(&self) {
        self.epts_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    pub fn stale_ticks(&self) -> u64 {
        self.stale_ticks.load(Ordering::Relaxed)
    }

    pub fn seeks_rejected(&self) -> u64 {
        self.seeks_rejected.load(Ordering::Relaxed)
    }

    pub fn timelines_loaded(&self) -> u64 {
        self.timelines_loaded.load(Ordering::Relaxed)
    }

    pub fn timelines_rejected(&self) -> u64 {
        self.timelines_rejected.load(Ordering::Relaxed)
    }

    pub fn integrity_warnings(&self) -> u64 {
        self.integrity_warnings.load(Ordering::Relaxed)
    }

    pub fn epts_merged(&self) -> u64 {
        self.epts_merged.load(Ordering::Relaxed)
    }

    /// Snapshot the counters and reset the per-interval ones
    pub fn report(&self) -> MetricsSummary {
        let ticks_in_interval = self.ticks_since_report.swap(0, Ordering::Relaxed);

        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed().as_secs_f64();
            *last = Instant::now();
            elapsed
        };
        let ticks_per_sec =
            if elapsed_secs > 0.0 { ticks_in_interval as f64 / elapsed_secs } else { 0.0 };

        MetricsSummary {
            ticks_total: self.ticks_total(),
            ticks_per_sec,
            stale_ticks: self.stale_ticks(),
            seeks_total: self.seeks_total.load(Ordering::Relaxed),
            seeks_rejected: self.seeks_rejected(),
            timelines_loaded: self.timelines_loaded(),
            timelines_rejected: self.timelines_rejected(),
            integrity_warnings: self.integrity_warnings(),
            epts_merged: self.epts_merged(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub ticks_total: u64,
    pub ticks_per_sec: f64,
    pub stale_ticks: u64,
    pub seeks_total: u64,
    pub seeks_rejected: u64,
    pub timelines_loaded: u64,
    pub timelines_rejected: u64,
    pub integrity_warnings: u64,
    pub epts_merged: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            ticks_total = %self.ticks_total,
            ticks_per_sec = %format!("{:.2}", self.ticks_per_sec),
            stale_ticks = %self.stale_ticks,
            seeks_total = %self.seeks_total,
            seeks_rejected = %self.seeks_rejected,
            timelines_loaded = %self.timelines_loaded,
            timelines_rejected = %self.timelines_rejected,
            integrity_warnings = %self.integrity_warnings,
            epts_merged = %self.epts_merged,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_resets_interval_counters_only() {
        let metrics = Metrics::new();
        metrics.record_tick();
        metrics.record_tick();
        metrics.record_seek(true);
        metrics.record_seek(false);

        let first = metrics.report();
        assert_eq!(first.ticks_total, 2);
        assert_eq!(first.seeks_total, 1);
        assert_eq!(first.seeks_rejected, 1);

        metrics.record_tick();
        let second = metrics.report();
        assert_eq!(second.ticks_total, 3);
        assert_eq!(second.seeks_rejected, 1);
    }

    #[test]
    fn test_summary_counters() {
        let metrics = Metrics::new();
        metrics.record_integrity_warnings(2);
        metrics.record_ept_merged();
        metrics.record_stale_tick();
        assert_eq!(metrics.integrity_warnings(), 2);
        assert_eq!(metrics.epts_merged(), 1);
        assert_eq!(metrics.stale_ticks(), 1);
    }
}
