//! REST client for the sales backend
//!
//! Endpoints:
//! - `GET  /events/`
//! - `GET  /events/{id}/summary`
//! - `GET  /events/{id}/timeline`
//! - `POST /events/selling-points/{sp_id}/epts`

use crate::domain::summary::{EptCreateRequest, EptRecord, EventSummary};
use crate::domain::timeline::RawTimeline;
use crate::domain::types::{Event, EventId, SellingPointId};
use crate::infra::config::Config;
use crate::io::source::EventSource;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, error, info};

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        info!(base_url = %config.api_base_url(), timeout_ms = %config.api_timeout_ms(), "api_client_created");
        Ok(Self { base_url: config.api_base_url().to_string(), client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let start = Instant::now();
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let body = Self::read_body(response, "GET", &url).await?;
        debug!(url = %url, bytes = %body.len(), latency_ms = %start.elapsed().as_millis(), "api_get");
        serde_json::from_slice(&body).with_context(|| format!("Invalid JSON from GET {}", url))
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let start = Instant::now();
        let url = self.url(path);
        let payload = serde_json::to_vec(body).context("Failed to encode request body")?;
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let body = Self::read_body(response, "POST", &url).await?;
        debug!(url = %url, bytes = %body.len(), latency_ms = %start.elapsed().as_millis(), "api_post");
        serde_json::from_slice(&body).with_context(|| format!("Invalid JSON from POST {}", url))
    }

    /// Body bytes of a 2xx response; anything else becomes an error carrying the status
    async fn read_body(response: reqwest::Response, method: &str, url: &str) -> anyhow::Result<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {} {}", method, url))?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&body);
            error!(method = %method, url = %url, status = %status.as_u16(), "api_request_failed");
            anyhow::bail!("{} {} returned {}: {}", method, url, status.as_u16(), detail.trim());
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl EventSource for ApiClient {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn list_events(&self) -> anyhow::Result<Vec<Event>> {
        self.get_json("/events/").await
    }

    async fn fetch_summary(&self, event_id: &EventId) -> anyhow::Result<EventSummary> {
        self.get_json(&format!("/events/{}/summary", event_id)).await
    }

    async fn fetch_timeline(&self, event_id: &EventId) -> anyhow::Result<RawTimeline> {
        self.get_json(&format!("/events/{}/timeline", event_id)).await
    }

    async fn create_ept(
        &self,
        selling_point_id: &SellingPointId,
        request: &EptCreateRequest,
    ) -> anyhow::Result<EptRecord> {
        let record: EptRecord = self
            .post_json(&format!("/events/selling-points/{}/epts", selling_point_id), request)
            .await?;
        info!(
            selling_point_id = %record.selling_point_id,
            ept_id = %record.id,
            provider = %record.provider.as_str(),
            "ept_created"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let config = Config::default().with_api_base_url("http://backend:9000/");
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://backend:9000");
        assert_eq!(client.url("/events/"), "http://backend:9000/events/");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let config = Config::default().with_api_base_url("http://127.0.0.1:9");
        let client = ApiClient::new(&config).unwrap();
        let err = client.list_events().await.unwrap_err();
        assert!(format!("{:#}", err).contains("GET http://127.0.0.1:9/events/ failed"));
    }
}
