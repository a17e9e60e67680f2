//! Abstraction over the upstream video search API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vidx_models::VideoRecord;

use crate::error::YouTubeResult;
use crate::key_rotator::ApiKey;

/// Validated records from one upstream call.
///
/// Order is whatever upstream returned and carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub videos: Vec<VideoRecord>,
    /// Items dropped by per-item validation.
    pub dropped: usize,
}

impl FetchBatch {
    pub fn new(videos: Vec<VideoRecord>, dropped: usize) -> Self {
        Self { videos, dropped }
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Source of newly published videos.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Fetch the most recent videos matching `query`.
    ///
    /// With `published_after` set, only videos published after that
    /// watermark (plus a small buffer) are requested.
    async fn fetch(
        &self,
        query: &str,
        key: &ApiKey,
        published_after: Option<DateTime<Utc>>,
    ) -> YouTubeResult<FetchBatch>;
}
