//! Snapshot-file source for offline replay
//!
//! Reads the same JSON payloads the backend serves, saved to disk. The
//! source is read-only: terminal creation is refused.

use crate::domain::summary::{EptCreateRequest, EptRecord, EventSummary};
use crate::domain::timeline::RawTimeline;
use crate::domain::types::{Event, EventId, SellingPointId};
use crate::io::source::EventSource;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    summary_file: Option<PathBuf>,
    timeline_file: Option<PathBuf>,
}

impl SnapshotSource {
    pub fn new(summary_file: Option<PathBuf>, timeline_file: Option<PathBuf>) -> Self {
        Self { summary_file, timeline_file }
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let value = serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        info!(path = %path.display(), bytes = %content.len(), "snapshot_loaded");
        Ok(value)
    }
}

#[async_trait]
impl EventSource for SnapshotSource {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        anyhow::bail!("snapshot files carry no event list")
    }

    async fn fetch_summary(&self, event_id: &EventId) -> anyhow::Result<EventSummary> {
        let path = self.summary_file.as_deref().context("no summary snapshot file configured")?;
        let summary: EventSummary = Self::read_json(path).await?;
        if &summary.event_id != event_id {
            warn!(requested = %event_id, found = %summary.event_id, "snapshot_event_mismatch");
        }
        Ok(summary)
    }

    async fn fetch_timeline(&self, _event_id: &EventId) -> anyhow::Result<RawTimeline> {
        let path = self.timeline_file.as_deref().context("no timeline snapshot file configured")?;
        Self::read_json(path).await
    }

    async fn create_ept(
        &self,
        selling_point_id: &SellingPointId,
        _request: &EptCreateRequest,
    ) -> anyhow::Result<EptRecord> {
        anyhow::bail!("cannot create a terminal under {} from a read-only snapshot", selling_point_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Cents, EptProvider};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_summary_snapshot() {
        let file = write(
            r#"{"event_id": "fest", "selling_points": [
                {"id": "bar", "name": "Main Bar", "total_cents": 12345,
                 "epts": [{"id": "e1", "label": "Till 1", "total_cents": 12345}]}
            ]}"#,
        );
        let source = SnapshotSource::new(Some(file.path().to_path_buf()), None);
        let summary = source.fetch_summary(&EventId::from("fest")).await.unwrap();
        assert_eq!(summary.total(), Cents(12_345));
        assert!(summary.integrity_warnings().is_empty());
    }

    #[tokio::test]
    async fn test_reads_timeline_snapshot_with_naive_timestamps() {
        let file = write(
            r#"{"event": {"start_at": "2024-06-01T10:00:00", "end_at": "2024-06-01T14:00:00"},
                "buckets": ["2024-06-01T10:00:00", "2024-06-01T10:15:00"],
                "series": [{"selling_point_id": "bar", "lat": 46.5, "lng": 6.6, "cumulative": [0, 100]}]}"#,
        );
        let source = SnapshotSource::new(None, Some(file.path().to_path_buf()));
        let raw = source.fetch_timeline(&EventId::from("fest")).await.unwrap();
        assert_eq!(raw.buckets.len(), 2);
        assert_eq!(raw.series[0].cumulative, vec![0, 100]);
    }

    #[tokio::test]
    async fn test_missing_files_are_errors() {
        let source = SnapshotSource::default();
        assert!(source.fetch_summary(&EventId::from("fest")).await.is_err());
        assert!(source.fetch_timeline(&EventId::from("fest")).await.is_err());
        assert!(source.list_events().await.is_err());

        let request = EptCreateRequest::new(EptProvider::Sumup, "Gate 2").unwrap();
        assert!(source.create_ept(&SellingPointId::from("bar"), &request).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let file = write("{ not json");
        let source = SnapshotSource::new(Some(file.path().to_path_buf()), None);
        let err = source.fetch_summary(&EventId::from("fest")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse snapshot"));
    }
}
