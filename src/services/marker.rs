//! Marker sizing for the map replay
//!
//! Radius grows with the square root of the cumulative amount, so marker
//! area tracks money collected. Pure functions only: they are recomputed on
//! every tick from the timeline and index, never accumulated.

use crate::domain::timeline::Timeline;
use crate::domain::types::{GeoPoint, SellingPointId};
use serde::Serialize;

/// Default divisor `k` in `sqrt(v) / k`
pub const DEFAULT_MARKER_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerScale {
    divisor: f64,
}

impl Default for MarkerScale {
    fn default() -> Self {
        Self { divisor: DEFAULT_MARKER_SCALE }
    }
}

impl MarkerScale {
    /// None unless `divisor` is finite and strictly positive
    pub fn new(divisor: f64) -> Option<Self> {
        (divisor.is_finite() && divisor > 0.0).then_some(Self { divisor })
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    #[inline]
    pub fn radius(&self, cumulative: u64) -> f64 {
        radius(cumulative, self.divisor)
    }
}

/// `sqrt(cumulative) / k`, never negative
#[inline]
pub fn radius(cumulative: u64, k: f64) -> f64 {
    ((cumulative as f64).sqrt() / k).max(0.0)
}

/// What a renderer needs to draw one selling point at the current index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub selling_point_id: SellingPointId,
    pub location: GeoPoint,
    pub cumulative: u64,
    pub radius: f64,
}

/// One marker per series, read at `index`. Empty when `index` is out of range.
pub fn markers_at(timeline: &Timeline, index: usize, scale: MarkerScale) -> Vec<Marker> {
    if index >= timeline.len() {
        return Vec::new();
    }
    timeline
        .series()
        .iter()
        .filter_map(|series| {
            let cumulative = series.value_at(index)?;
            Some(Marker {
                selling_point_id: series.selling_point_id.clone(),
                location: series.location,
                cumulative,
                radius: scale.radius(cumulative),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_gives_zero_radius() {
        assert_eq!(MarkerScale::default().radius(0), 0.0);
    }

    #[test]
    fn test_square_root_scaling() {
        let scale = MarkerScale::default();
        assert_eq!(scale.radius(100), 1.0);
        assert_eq!(scale.radius(10_000), 10.0);
        assert!((scale.radius(250) - 1.5811).abs() < 1e-3);
    }

    #[test]
    fn test_radius_is_non_decreasing() {
        let scale = MarkerScale::default();
        let mut previous = scale.radius(0);
        for value in (0..50_000u64).step_by(37) {
            let r = scale.radius(value);
            assert!(r >= previous, "radius({}) = {} < {}", value, r, previous);
            previous = r;
        }
    }

    #[test]
    fn test_scale_rejects_bad_divisor() {
        assert!(MarkerScale::new(0.0).is_none());
        assert!(MarkerScale::new(-2.0).is_none());
        assert!(MarkerScale::new(f64::NAN).is_none());
        assert_eq!(MarkerScale::new(5.0).unwrap().radius(100), 2.0);
    }
}
