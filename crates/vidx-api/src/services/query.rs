//! Read side: paginated listing and free-text search over the index.

use std::sync::Arc;

use tracing::{debug, error};

use vidx_models::VideoListResponse;
use vidx_search::VideoIndex;

use crate::error::{ApiError, ApiResult};

const LIST_FAILED: &str = "Internal server error while fetching videos.";
const SEARCH_FAILED: &str = "Internal server error while searching videos.";

/// Translates read requests into index queries.
#[derive(Clone)]
pub struct QueryService {
    index: Arc<dyn VideoIndex>,
    default_page_size: u32,
    max_page_size: u32,
}

impl QueryService {
    pub fn new(index: Arc<dyn VideoIndex>, default_page_size: u32, max_page_size: u32) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            index,
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    /// Effective page size: default when absent, clamped to `[1, max]`.
    pub fn normalize_size(&self, size: Option<u32>) -> u32 {
        size.unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }

    /// Newest-first page of videos. `page` starts at 1.
    pub async fn list(&self, page: Option<u32>, size: Option<u32>) -> ApiResult<VideoListResponse> {
        let page = match page {
            None => 1,
            Some(0) => return Err(ApiError::validation("page must be greater than or equal to 1")),
            Some(p) => p,
        };
        let size = self.normalize_size(size);

        debug!(page, size, "Listing videos");

        match self.index.list_paginated(page, size).await {
            Ok(result) => Ok(VideoListResponse::from_page(page, result)),
            Err(e) => {
                error!(page, size, "Failed to list videos: {}", e);
                Err(ApiError::internal(LIST_FAILED))
            }
        }
    }

    /// Fuzzy search over title and description, most relevant first.
    pub async fn search(&self, q: Option<&str>) -> ApiResult<VideoListResponse> {
        let query = q.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(ApiError::validation("query parameter 'q' must not be empty"));
        }

        debug!(query, "Searching videos");

        match self.index.search(query).await {
            Ok(result) => Ok(VideoListResponse::from_page(1, result)),
            Err(e) => {
                error!(query, "Failed to search videos: {}", e);
                Err(ApiError::internal(SEARCH_FAILED))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use vidx_models::{VideoPage, VideoRecord};
    use vidx_search::{MemoryVideoIndex, SearchError, SearchResult};

    /// Index whose reads fail outright.
    struct BrokenIndex;

    #[async_trait]
    impl VideoIndex for BrokenIndex {
        async fn ping(&self) -> bool {
            false
        }

        async fn ensure_schema(&self) -> SearchResult<()> {
            Ok(())
        }

        async fn upsert(&self, record: VideoRecord) -> SearchResult<VideoRecord> {
            Ok(record)
        }

        async fn max_published_at(&self) -> SearchResult<Option<DateTime<Utc>>> {
            Ok(None)
        }

        async fn list_paginated(&self, _page: u32, _size: u32) -> SearchResult<VideoPage> {
            Err(SearchError::ServerError(500, "shard failure on node-7".into()))
        }

        async fn search(&self, _text: &str) -> SearchResult<VideoPage> {
            Err(SearchError::ServerError(500, "shard failure on node-7".into()))
        }
    }

    async fn service_with(count: u32) -> QueryService {
        let index = Arc::new(MemoryVideoIndex::new());
        for i in 0..count {
            let record = VideoRecord::new(
                format!("vid{}", i),
                format!("Cricket match {}", i),
                "Highlights",
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i as i64),
                "https://i.ytimg.com/vi/x/mqdefault.jpg",
            )
            .unwrap();
            index.upsert(record).await.unwrap();
        }
        QueryService::new(index, 10, 50)
    }

    #[tokio::test]
    async fn test_list_defaults() {
        let service = service_with(12).await;
        let response = service.list(None, None).await.unwrap();
        assert_eq!(response.page, 1);
        assert_eq!(response.size, 10);
        assert_eq!(response.total, 12);
        assert_eq!(response.videos[0].id.as_str(), "vid11");
    }

    #[tokio::test]
    async fn test_list_page_zero_rejected() {
        let service = service_with(1).await;
        let err = service.list(Some(0), None).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_size_is_clamped() {
        let service = service_with(0).await;
        assert_eq!(service.normalize_size(Some(0)), 1);
        assert_eq!(service.normalize_size(Some(500)), 50);
        assert_eq!(service.normalize_size(None), 10);
    }

    #[tokio::test]
    async fn test_last_partial_page_and_beyond() {
        let service = service_with(12).await;

        let last = service.list(Some(2), Some(10)).await.unwrap();
        assert_eq!(last.size, 2);
        assert_eq!(last.total, 12);

        let beyond = service.list(Some(5), Some(10)).await.unwrap();
        assert_eq!(beyond.size, 0);
        assert!(beyond.videos.is_empty());
        assert_eq!(beyond.total, 12);
        assert_eq!(beyond.page, 5);
    }

    #[tokio::test]
    async fn test_search_requires_non_blank_query() {
        let service = service_with(1).await;
        assert!(matches!(service.search(None).await, Err(ApiError::Validation(_))));
        assert!(matches!(service.search(Some("   ")).await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_envelope() {
        let service = service_with(3).await;
        let response = service.search(Some(" crickt ")).await.unwrap();
        assert_eq!(response.page, 1);
        assert_eq!(response.total, 3);
        assert_eq!(response.size, 3);
    }

    #[tokio::test]
    async fn test_store_failures_become_generic_errors() {
        let service = QueryService::new(Arc::new(BrokenIndex), 10, 50);

        match service.list(None, None).await {
            Err(ApiError::Internal(msg)) => assert_eq!(msg, LIST_FAILED),
            other => panic!("expected internal error, got {:?}", other.map(|r| r.total)),
        }
        match service.search(Some("cricket")).await {
            Err(ApiError::Internal(msg)) => assert_eq!(msg, SEARCH_FAILED),
            other => panic!("expected internal error, got {:?}", other.map(|r| r.total)),
        }
    }
}
