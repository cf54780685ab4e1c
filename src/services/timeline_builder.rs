//! Timeline validation - turns a raw payload into a playable `Timeline`
//!
//! Shape defects (bounds, bucket order, series length, duplicate series)
//! and integrity defects (negative or decreasing cumulative values) are
//! reported as distinct `TimelineError` variants. Nothing is clamped or
//! repaired: a payload either passes every check or is refused whole.

use crate::domain::error::TimelineError;
use crate::domain::timeline::{RawSeries, RawTimeline, SellingPointSeries, Timeline};
use crate::domain::types::GeoPoint;
use crate::infra::metrics::Metrics;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
pub struct TimelineBuilder {
    metrics: Option<Arc<Metrics>>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self { metrics: None }
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self { metrics: Some(metrics) }
    }

    /// Validate `raw` and produce an immutable `Timeline`
    pub fn build(&self, raw: RawTimeline) -> Result<Timeline, TimelineError> {
        match Self::validate(raw) {
            Ok(timeline) => {
                info!(
                    buckets = %timeline.len(),
                    series = %timeline.series().len(),
                    empty = %timeline.is_empty(),
                    "timeline_built"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_timeline_loaded();
                }
                Ok(timeline)
            }
            Err(e) => {
                warn!(kind = %e.kind(), integrity = %e.is_integrity(), error = %e, "timeline_rejected");
                if let Some(metrics) = &self.metrics {
                    metrics.record_timeline_rejected();
                }
                Err(e)
            }
        }
    }

    fn validate(raw: RawTimeline) -> Result<Timeline, TimelineError> {
        if raw.event.start_at >= raw.event.end_at {
            return Err(TimelineError::InvalidBounds);
        }

        if let Some(index) = raw.buckets.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TimelineError::UnorderedBuckets { index: index + 1 });
        }

        let expected = raw.buckets.len();
        let mut seen = HashSet::with_capacity(raw.series.len());
        let mut series = Vec::with_capacity(raw.series.len());

        for entry in raw.series {
            if !seen.insert(entry.selling_point_id.clone()) {
                return Err(TimelineError::DuplicateSeries(entry.selling_point_id));
            }
            series.push(Self::validate_series(entry, expected)?);
        }

        Ok(Timeline { bounds: raw.event, buckets: raw.buckets, series })
    }

    fn validate_series(entry: RawSeries, expected: usize) -> Result<SellingPointSeries, TimelineError> {
        if entry.cumulative.len() != expected {
            return Err(TimelineError::ShapeMismatch {
                selling_point_id: entry.selling_point_id,
                expected,
                actual: entry.cumulative.len(),
            });
        }

        let mut cumulative = Vec::with_capacity(expected);
        for (index, &value) in entry.cumulative.iter().enumerate() {
            let Ok(value) = u64::try_from(value) else {
                return Err(TimelineError::NegativeCumulative {
                    selling_point_id: entry.selling_point_id,
                    index,
                    value,
                });
            };
            if let Some(&previous) = cumulative.last() {
                if value < previous {
                    return Err(TimelineError::MonotonicityViolation {
                        selling_point_id: entry.selling_point_id,
                        index,
                        previous,
                        current: value,
                    });
                }
            }
            cumulative.push(value);
        }

        Ok(SellingPointSeries {
            selling_point_id: entry.selling_point_id,
            location: GeoPoint::new(entry.lat, entry.lng),
            cumulative,
        })
    }
}
