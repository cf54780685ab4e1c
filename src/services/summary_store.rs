//! Summary store - holds the summary tree shown by one view
//!
//! Applies the configured integrity policy on load, merges terminals created
//! through the backend, and renders the tree as display lines.

use crate::domain::error::SummaryError;
use crate::domain::summary::{EptRecord, EventSummary, IntegrityWarning};
use crate::domain::types::SellingPointId;
use crate::infra::config::IntegrityPolicy;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SummaryStore {
    summary: Option<EventSummary>,
    warnings: Vec<IntegrityWarning>,
    policy: IntegrityPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl SummaryStore {
    pub fn new(policy: IntegrityPolicy) -> Self {
        Self { summary: None, warnings: Vec::new(), policy, metrics: None }
    }

    pub fn with_metrics(policy: IntegrityPolicy, metrics: Arc<Metrics>) -> Self {
        Self { metrics: Some(metrics), ..Self::new(policy) }
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    pub fn summary(&self) -> Option<&EventSummary> {
        self.summary.as_ref()
    }

    /// Selling points whose total disagrees with their terminals
    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    pub fn is_flagged(&self, selling_point_id: &SellingPointId) -> bool {
        self.warnings.iter().any(|w| &w.selling_point_id == selling_point_id)
    }

    /// Install a freshly fetched summary.
    ///
    /// Under `Reject` an inconsistent summary is refused and the previous
    /// one stays in place.
    pub fn replace(&mut self, summary: EventSummary) -> Result<&[IntegrityWarning], SummaryError> {
        let warnings = summary.integrity_warnings();

        if !warnings.is_empty() {
            if let Some(metrics) = &self.metrics {
                metrics.record_integrity_warnings(warnings.len() as u64);
            }
            for warning in &warnings {
                warn!(
                    event_id = %summary.event_id,
                    selling_point_id = %warning.selling_point_id,
                    reported = %warning.reported,
                    terminals_sum = %warning.terminals_sum,
                    policy = %self.policy.as_str(),
                    "summary_integrity_warning"
                );
            }
            if self.policy == IntegrityPolicy::Reject {
                return Err(SummaryError::Integrity(warnings));
            }
        }

        info!(
            event_id = %summary.event_id,
            selling_points = %summary.selling_points.len(),
            total = %summary.total(),
            "summary_loaded"
        );
        self.summary = Some(summary);
        self.warnings = warnings;
        Ok(&self.warnings)
    }

    /// Merge a terminal the backend just created under its selling point
    pub fn apply_created_ept(&mut self, record: EptRecord) -> Result<(), SummaryError> {
        let selling_point_id = record.selling_point_id.clone();
        let Some(summary) = self.summary.as_mut() else {
            return Err(SummaryError::UnknownSellingPoint(selling_point_id));
        };

        let ept_id = record.id.clone();
        let provider = record.provider;
        summary.append_ept(&selling_point_id, record.into())?;
        self.warnings = summary.integrity_warnings();

        if let Some(metrics) = &self.metrics {
            metrics.record_ept_merged();
        }
        info!(
            selling_point_id = %selling_point_id,
            ept_id = %ept_id,
            provider = %provider.as_str(),
            "ept_merged"
        );
        Ok(())
    }

    /// Text rendering of the tree, one line per node
    pub fn lines(&self) -> Vec<String> {
        let Some(summary) = self.summary.as_ref().filter(|s| !s.selling_points.is_empty()) else {
            return vec!["No data.".to_string()];
        };

        let mut lines = Vec::new();
        for selling_point in &summary.selling_points {
            let mut line = format!("{} - {}", selling_point.name, selling_point.total_cents);
            if let Some(warning) = self.warnings.iter().find(|w| w.selling_point_id == selling_point.id) {
                line.push_str(&format!(" [!] terminals sum to {}", warning.terminals_sum));
            }
            lines.push(line);
            for ept in &selling_point.epts {
                lines.push(format!("  {}: {}", ept.label, ept.total_cents));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::summary::{EptSummary, SellingPointSummary};
    use crate::domain::types::{Cents, EptId, EptProvider, EventId};

    fn summary(bar_total: u64) -> EventSummary {
        EventSummary {
            event_id: EventId::from("fest"),
            selling_points: vec![
                SellingPointSummary {
                    id: SellingPointId::from("bar"),
                    name: "Main Bar".to_string(),
                    total_cents: Cents(bar_total),
                    epts: vec![
                        EptSummary { id: EptId::from("e1"), label: "Till 1".to_string(), total_cents: Cents(10_000) },
                        EptSummary { id: EptId::from("e2"), label: "Till 2".to_string(), total_cents: Cents(2_345) },
                    ],
                },
                SellingPointSummary {
                    id: SellingPointId::from("food"),
                    name: "Food Court".to_string(),
                    total_cents: Cents(0),
                    epts: vec![],
                },
            ],
        }
    }

    fn created(sp: &str, label: &str) -> EptRecord {
        EptRecord {
            id: EptId::from("e9"),
            selling_point_id: SellingPointId::from(sp),
            provider: EptProvider::Sumup,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_consistent_summary_has_no_warnings() {
        let mut store = SummaryStore::new(IntegrityPolicy::Warn);
        assert!(store.replace(summary(12_345)).unwrap().is_empty());
        assert_eq!(
            store.lines(),
            vec!["Main Bar - 123.45", "  Till 1: 100.00", "  Till 2: 23.45", "Food Court - 0.00"]
        );
    }

    #[test]
    fn test_warn_policy_keeps_and_flags() {
        let metrics = Arc::new(Metrics::new());
        let mut store = SummaryStore::with_metrics(IntegrityPolicy::Warn, metrics.clone());
        let warnings = store.replace(summary(12_344)).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(store.is_flagged(&SellingPointId::from("bar")));
        assert!(!store.is_flagged(&SellingPointId::from("food")));
        assert_eq!(store.lines()[0], "Main Bar - 123.44 [!] terminals sum to 123.45");
        assert_eq!(metrics.integrity_warnings(), 1);
    }

    #[test]
    fn test_reject_policy_keeps_previous() {
        let mut store = SummaryStore::new(IntegrityPolicy::Reject);
        store.replace(summary(12_345)).unwrap();

        let err = store.replace(summary(12_344)).unwrap_err();
        assert!(matches!(err, SummaryError::Integrity(ref w) if w.len() == 1));
        assert_eq!(store.summary().unwrap().total(), Cents(12_345));
    }

    #[test]
    fn test_empty_renders_no_data() {
        let mut store = SummaryStore::new(IntegrityPolicy::Warn);
        assert_eq!(store.lines(), vec!["No data."]);
        store.replace(EventSummary::new(EventId::from("fest"))).unwrap();
        assert_eq!(store.lines(), vec!["No data."]);
    }

    #[test]
    fn test_created_ept_is_merged() {
        let mut store = SummaryStore::new(IntegrityPolicy::Warn);
        store.replace(summary(12_345)).unwrap();
        store.apply_created_ept(created("food", "Gate 2")).unwrap();

        let summary = store.summary().unwrap();
        let food = summary.selling_point(&SellingPointId::from("food")).unwrap();
        assert_eq!(food.epts.len(), 1);
        assert_eq!(food.epts[0].label, "Gate 2");
        assert_eq!(food.epts[0].total_cents, Cents::ZERO);
        assert_eq!(summary.selling_point(&SellingPointId::from("bar")).unwrap().total_cents, Cents(12_345));
        assert!(store.warnings().is_empty());
        assert_eq!(store.lines().last().unwrap(), "  Gate 2: 0.00");
    }

    #[test]
    fn test_created_ept_unknown_parent() {
        let mut store = SummaryStore::new(IntegrityPolicy::Warn);
        assert!(store.apply_created_ept(created("bar", "X")).is_err());
        store.replace(summary(12_345)).unwrap();
        assert_eq!(
            store.apply_created_ept(created("nope", "X")),
            Err(SummaryError::UnknownSellingPoint(SellingPointId::from("nope")))
        );
    }
}
