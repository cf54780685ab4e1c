//! Data source seam for events, summaries and timelines
//!
//! Implemented by the REST client and by the snapshot-file reader so the
//! binaries can replay either a live backend or a saved payload.

use crate::domain::summary::{EptCreateRequest, EptRecord, EventSummary};
use crate::domain::timeline::RawTimeline;
use crate::domain::types::{Event, EventId, SellingPointId};
use async_trait::async_trait;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn list_events(&self) -> anyhow::Result<Vec<Event>>;

    async fn fetch_summary(&self, event_id: &EventId) -> anyhow::Result<EventSummary>;

    /// Raw payload; callers validate it through `TimelineBuilder`
    async fn fetch_timeline(&self, event_id: &EventId) -> anyhow::Result<RawTimeline>;

    async fn create_ept(
        &self,
        selling_point_id: &SellingPointId,
        request: &EptCreateRequest,
    ) -> anyhow::Result<EptRecord>;
}
