//! Summary aggregation tree: event → selling points → terminals
//!
//! Totals arrive pre-aggregated from the backend. The tree never recomputes
//! a selling point's total from its terminals; it only checks the two agree
//! and reports an [`IntegrityWarning`] when they don't.

use serde::{Deserialize, Serialize};

use crate::domain::error::SummaryError;
use crate::domain::types::{Cents, EptId, EptProvider, EventId, SellingPointId};

/// Leaf of the tree: one payment terminal and what it collected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EptSummary {
    pub id: EptId,
    pub label: String,
    pub total_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellingPointSummary {
    pub id: SellingPointId,
    pub name: String,
    pub total_cents: Cents,
    #[serde(default)]
    pub epts: Vec<EptSummary>,
}

/// A selling point whose reported total disagrees with its terminals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityWarning {
    pub selling_point_id: SellingPointId,
    pub reported: Cents,
    pub terminals_sum: Cents,
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: reported {} but terminals sum to {}",
            self.selling_point_id, self.reported, self.terminals_sum
        )
    }
}

impl SellingPointSummary {
    pub fn terminals_sum(&self) -> Cents {
        self.epts.iter().map(|e| e.total_cents).sum()
    }

    /// None when `total == sum(ept.total)`
    pub fn integrity(&self) -> Option<IntegrityWarning> {
        let terminals_sum = self.terminals_sum();
        if terminals_sum == self.total_cents {
            return None;
        }
        Some(IntegrityWarning {
            selling_point_id: self.id.clone(),
            reported: self.total_cents,
            terminals_sum,
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.integrity().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: EventId,
    #[serde(default)]
    pub selling_points: Vec<SellingPointSummary>,
}

impl EventSummary {
    pub fn new(event_id: EventId) -> Self {
        Self { event_id, selling_points: Vec::new() }
    }

    /// Sum of selling-point totals
    pub fn total(&self) -> Cents {
        self.selling_points.iter().map(|sp| sp.total_cents).sum()
    }

    pub fn selling_point(&self, id: &SellingPointId) -> Option<&SellingPointSummary> {
        self.selling_points.iter().find(|sp| &sp.id == id)
    }

    pub fn integrity_warnings(&self) -> Vec<IntegrityWarning> {
        self.selling_points.iter().filter_map(SellingPointSummary::integrity).collect()
    }

    /// Merge a newly created terminal under its parent selling point.
    ///
    /// The parent's total grows by the terminal's total (zero for a
    /// terminal that was just created), so a consistent node stays
    /// consistent. Other selling points are untouched.
    pub fn append_ept(
        &mut self,
        selling_point_id: &SellingPointId,
        ept: EptSummary,
    ) -> Result<(), SummaryError> {
        let selling_point = self
            .selling_points
            .iter_mut()
            .find(|sp| &sp.id == selling_point_id)
            .ok_or_else(|| SummaryError::UnknownSellingPoint(selling_point_id.clone()))?;

        selling_point.total_cents = selling_point.total_cents.saturating_add(ept.total_cents);
        selling_point.epts.push(ept);
        Ok(())
    }
}

/// Terminal-creation request sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EptCreateRequest {
    pub provider: EptProvider,
    pub label: String,
}

impl EptCreateRequest {
    pub fn new(provider: EptProvider, label: &str) -> Result<Self, SummaryError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SummaryError::EmptyLabel);
        }
        Ok(Self { provider, label: label.to_string() })
    }
}

/// Terminal record returned by the backend after creation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EptRecord {
    pub id: EptId,
    pub selling_point_id: SellingPointId,
    pub provider: EptProvider,
    pub label: String,
}

impl From<EptRecord> for EptSummary {
    fn from(record: EptRecord) -> Self {
        Self { id: record.id, label: record.label, total_cents: Cents::ZERO }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ept(id: &str, label: &str, total: u64) -> EptSummary {
        EptSummary { id: EptId::from(id), label: label.to_string(), total_cents: Cents(total) }
    }

    fn selling_point(id: &str, total: u64, epts: Vec<EptSummary>) -> SellingPointSummary {
        SellingPointSummary {
            id: SellingPointId::from(id),
            name: format!("SP {}", id),
            total_cents: Cents(total),
            epts,
        }
    }

    #[test]
    fn test_consistent_selling_point() {
        let sp = selling_point("bar", 12345, vec![ept("e1", "WL-1", 10000), ept("e2", "SU-1", 2345)]);
        assert!(sp.is_consistent());
        assert_eq!(sp.integrity(), None);
    }

    #[test]
    fn test_inconsistent_selling_point_is_flagged() {
        let sp = selling_point("bar", 12345, vec![ept("e1", "WL-1", 10000), ept("e2", "SU-1", 2344)]);
        let warning = sp.integrity().unwrap();
        assert_eq!(warning.reported, Cents(12345));
        assert_eq!(warning.terminals_sum, Cents(12344));
        assert_eq!(warning.to_string(), "bar: reported 123.45 but terminals sum to 123.44");
    }

    #[test]
    fn test_empty_terminal_list_is_valid() {
        let sp = selling_point("merch", 0, vec![]);
        assert!(sp.is_consistent());
        assert!(sp.epts.is_empty());
    }

    #[test]
    fn test_event_total_sums_selling_points() {
        let summary = EventSummary {
            event_id: EventId::from("ev"),
            selling_points: vec![
                selling_point("a", 500, vec![ept("e1", "A", 500)]),
                selling_point("b", 250, vec![ept("e2", "B", 250)]),
            ],
        };
        assert_eq!(summary.total(), Cents(750));
        assert!(summary.integrity_warnings().is_empty());
    }

    #[test]
    fn test_append_ept_only_touches_parent() {
        let mut summary = EventSummary {
            event_id: EventId::from("ev"),
            selling_points: vec![
                selling_point("a", 500, vec![ept("e1", "A", 500)]),
                selling_point("b", 250, vec![ept("e2", "B", 250)]),
            ],
        };
        let record = EptRecord {
            id: EptId::from("e3"),
            selling_point_id: SellingPointId::from("a"),
            provider: EptProvider::Sumup,
            label: "Gate 2".to_string(),
        };

        summary.append_ept(&SellingPointId::from("a"), record.into()).unwrap();

        let a = summary.selling_point(&SellingPointId::from("a")).unwrap();
        assert_eq!(a.epts.len(), 2);
        assert_eq!(a.epts[1].label, "Gate 2");
        assert_eq!(a.total_cents, Cents(500));
        let b = summary.selling_point(&SellingPointId::from("b")).unwrap();
        assert_eq!(b.total_cents, Cents(250));
        assert_eq!(b.epts.len(), 1);
    }

    #[test]
    fn test_append_ept_unknown_parent() {
        let mut summary = EventSummary::new(EventId::from("ev"));
        let result = summary.append_ept(&SellingPointId::from("nope"), ept("e1", "X", 0));
        assert_eq!(result, Err(SummaryError::UnknownSellingPoint(SellingPointId::from("nope"))));
    }

    #[test]
    fn test_create_request_requires_label() {
        assert_eq!(EptCreateRequest::new(EptProvider::Other, "   "), Err(SummaryError::EmptyLabel));
        let req = EptCreateRequest::new(EptProvider::Sumup, " Gate 2 ").unwrap();
        assert_eq!(req.label, "Gate 2");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"provider":"sumup","label":"Gate 2"}"#);
    }

    #[test]
    fn test_summary_payload_deserializes() {
        let json = r#"{
            "event_id": "ev-1",
            "selling_points": [
                {"id": "sp-1", "name": "Bar", "total_cents": 12345,
                 "epts": [{"id": "e1", "label": "WL-1", "total_cents": 10000},
                          {"id": "e2", "label": "SU-1", "total_cents": 2345}]},
                {"id": "sp-2", "name": "Merch", "total_cents": 0, "epts": []}
            ]
        }"#;
        let summary: EventSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.selling_points.len(), 2);
        assert_eq!(summary.total(), Cents(12345));
        assert!(summary.integrity_warnings().is_empty());
    }
}
