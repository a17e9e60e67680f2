//! YouTube Data API `search.list` client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tracing::{debug, info, warn};

use vidx_models::format_rfc3339_seconds;

use crate::error::{YouTubeError, YouTubeResult};
use crate::key_rotator::ApiKey;
use crate::metrics::{record_item_rejected, record_request};
use crate::source::{FetchBatch, VideoSource};
use crate::types::{ErrorEnvelope, SearchListResponse};

/// Page size requested from upstream (the API maximum).
pub const MAX_RESULTS: u32 = 50;

/// Added to the watermark before it is sent as `publishedAfter`.
///
/// Upstream compares at whole-second precision. Boundary duplicates are
/// absorbed by the upsert.
pub const PUBLISHED_AFTER_BUFFER_SECS: i64 = 1;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Configuration for the YouTube client.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// `maxResults` sent upstream
    pub max_results: u32,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(5),
            max_results: MAX_RESULTS,
        }
    }
}

impl YouTubeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("YOUTUBE_API_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("YOUTUBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            connect_timeout: Duration::from_secs(5),
            max_results: MAX_RESULTS,
        }
    }
}

/// Client for the `search.list` endpoint.
#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
}

impl YouTubeClient {
    /// Create a new client.
    pub fn new(config: YouTubeConfig) -> YouTubeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vidx-youtube/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(YouTubeError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> YouTubeResult<Self> {
        Self::new(YouTubeConfig::from_env())
    }

    /// Query parameters for one search call.
    pub fn search_params(
        &self,
        query: &str,
        key: &ApiKey,
        published_after: Option<DateTime<Utc>>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("q", query.to_string()),
            ("key", key.expose().to_string()),
            ("type", "video".to_string()),
            ("order", "date".to_string()),
            ("maxResults", self.config.max_results.to_string()),
        ];

        if let Some(watermark) = published_after {
            params.push(("publishedAfter", published_after_param(watermark)));
        }

        params
    }

    /// Fetch the latest videos for `query`, optionally newer than a watermark.
    pub async fn fetch_latest(
        &self,
        query: &str,
        key: &ApiKey,
        published_after: Option<DateTime<Utc>>,
    ) -> YouTubeResult<FetchBatch> {
        let url = format!("{}/search", self.config.base_url);
        let params = self.search_params(query, key, published_after);

        match published_after {
            Some(_) => info!(
                query = %query,
                published_after = %published_after_param_or_empty(&params),
                key = %key,
                "Fetching videos published after watermark"
            ),
            None => info!(query = %query, key = %key, "Fetching initial set of videos (no watermark)"),
        }

        let start = Instant::now();
        let result = self.send_search(&url, &params).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        record_request(outcome, latency_ms);

        let response = result?;
        Ok(Self::validate_items(response))
    }

    async fn send_search(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> YouTubeResult<SearchListResponse> {
        // Strip the URL from transport errors: it carries the API key.
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| YouTubeError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            let message = envelope
                .error
                .message
                .clone()
                .unwrap_or_else(|| body.chars().take(200).collect());
            let err = YouTubeError::from_http_status(status.as_u16(), envelope.first_reason(), message);

            if err.is_quota_exceeded() {
                warn!(status = status.as_u16(), "YouTube API quota likely exceeded for the current key: {}", err);
            }
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| YouTubeError::Network(e.without_url()))?;

        serde_json::from_str(&body).map_err(|e| {
            YouTubeError::Parse(format!(
                "{} (body prefix: {})",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })
    }

    /// Convert upstream items, dropping the ones that fail validation.
    fn validate_items(response: SearchListResponse) -> FetchBatch {
        if response.items.is_empty() {
            info!("No new videos found since last check");
            return FetchBatch::default();
        }

        let total = response.items.len();
        let mut videos = Vec::with_capacity(total);
        let mut dropped = 0usize;

        for item in response.items {
            let video_id = item.video_id().map(str::to_string);
            match item.into_record() {
                Ok(record) => videos.push(record),
                Err(rejection) => {
                    dropped += 1;
                    record_item_rejected(rejection.reason());
                    warn!(
                        video_id = video_id.as_deref().unwrap_or("<none>"),
                        "Skipping upstream item: {}", rejection
                    );
                }
            }
        }

        debug!("Validated {} of {} upstream items", videos.len(), total);
        FetchBatch::new(videos, dropped)
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn fetch(
        &self,
        query: &str,
        key: &ApiKey,
        published_after: Option<DateTime<Utc>>,
    ) -> YouTubeResult<FetchBatch> {
        self.fetch_latest(query, key, published_after).await
    }
}

/// `publishedAfter` value: watermark plus the buffer, second precision, `Z`.
pub fn published_after_param(watermark: DateTime<Utc>) -> String {
    format_rfc3339_seconds(watermark + TimeDelta::seconds(PUBLISHED_AFTER_BUFFER_SECS))
}

fn published_after_param_or_empty<'a>(params: &'a [(&'static str, String)]) -> &'a str {
    params
        .iter()
        .find(|(k, _)| *k == "publishedAfter")
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}
