//! Bucketed timeline of cumulative sales per selling point
//!
//! `RawTimeline` is the payload as delivered by the backend. `Timeline` is
//! the validated form and can only be produced by the timeline builder, so
//! every `Timeline` in hand satisfies:
//! - `start_at < end_at`
//! - buckets strictly increasing
//! - `series[i].cumulative.len() == buckets.len()` for every series
//! - every cumulative sequence non-decreasing

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::types::{deserialize_instant, deserialize_instants, GeoPoint, SellingPointId};

/// Event time bounds carried by the timeline payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventBounds {
    #[serde(deserialize_with = "deserialize_instant")]
    pub start_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSeries {
    pub selling_point_id: SellingPointId,
    pub lat: f64,
    pub lng: f64,
    /// Signed so negative values reach the builder instead of failing in serde
    pub cumulative: Vec<i64>,
}

/// Timeline payload before validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTimeline {
    pub event: EventBounds,
    #[serde(deserialize_with = "deserialize_instants")]
    pub buckets: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub series: Vec<RawSeries>,
}

/// One selling point's cumulative sales, aligned with the timeline buckets
#[derive(Debug, Clone, PartialEq)]
pub struct SellingPointSeries {
    pub selling_point_id: SellingPointId,
    pub location: GeoPoint,
    pub(crate) cumulative: Vec<u64>,
}

impl SellingPointSeries {
    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    pub fn value_at(&self, index: usize) -> Option<u64> {
        self.cumulative.get(index).copied()
    }

    /// Last cumulative value, i.e. the total at the end of the event
    pub fn final_value(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub(crate) bounds: EventBounds,
    pub(crate) buckets: Vec<DateTime<Utc>>,
    pub(crate) series: Vec<SellingPointSeries>,
}

impl Timeline {
    pub fn bounds(&self) -> EventBounds {
        self.bounds
    }

    pub fn buckets(&self) -> &[DateTime<Utc>] {
        &self.buckets
    }

    pub fn series(&self) -> &[SellingPointSeries] {
        &self.series
    }

    /// Number of playable positions (N)
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Zero buckets: valid, but nothing to animate
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket_at(&self, index: usize) -> Option<DateTime<Utc>> {
        self.buckets.get(index).copied()
    }

    pub fn series_for(&self, selling_point_id: &SellingPointId) -> Option<&SellingPointSeries> {
        self.series.iter().find(|s| &s.selling_point_id == selling_point_id)
    }

    pub fn cumulative_at(&self, selling_point_id: &SellingPointId, index: usize) -> Option<u64> {
        self.series_for(selling_point_id)?.value_at(index)
    }

    /// Fraction of the event elapsed at `index`, from the actual bucket
    /// timestamp. Buckets outside the bounds clamp to `[0, 1]`.
    pub fn progress_at(&self, index: usize) -> Option<f64> {
        let at = self.bucket_at(index)?;
        let total = (self.bounds.end_at - self.bounds.start_at).num_milliseconds();
        if total <= 0 {
            return None;
        }
        let elapsed = (at - self.bounds.start_at).num_milliseconds();
        Some((elapsed as f64 / total as f64).clamp(0.0, 1.0))
    }

    /// Common spacing when the buckets form a uniform partition.
    /// Display only; nothing else may rely on it.
    pub fn uniform_spacing(&self) -> Option<chrono::Duration> {
        let mut gaps = self.buckets.windows(2).map(|w| w[1] - w[0]);
        let first = gaps.next()?;
        gaps.all(|gap| gap == first).then_some(first)
    }
}
