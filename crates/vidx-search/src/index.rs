//! The video index contract and its Elasticsearch implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use vidx_models::{VideoPage, VideoRecord};

use crate::client::ElasticClient;
use crate::error::{SearchError, SearchResult};
use crate::types::{sort_by_published_desc, Hit, SearchRequest};

/// Elasticsearch's default `index.max_result_window`.
pub const MAX_RESULT_WINDOW: u64 = 10_000;

/// Upper bound on hits returned by a single search.
pub const SEARCH_RESULT_CAP: u64 = 10_000;

/// Fields covered by free-text search.
pub const SEARCH_FIELDS: [&str; 2] = ["title", "description"];

/// Storage for indexed videos.
///
/// Implementations must be safe for concurrent callers: the fetch loop writes
/// while request handlers read.
#[async_trait]
pub trait VideoIndex: Send + Sync {
    /// Whether the backing store is reachable.
    async fn ping(&self) -> bool;

    /// Create the index and its mapping if missing. Idempotent.
    async fn ensure_schema(&self) -> SearchResult<()>;

    /// Insert or overwrite by video id, stamping `indexed_at`.
    async fn upsert(&self, record: VideoRecord) -> SearchResult<VideoRecord>;

    /// Latest `published_at` in the index, `None` when empty or missing.
    async fn max_published_at(&self) -> SearchResult<Option<DateTime<Utc>>>;

    /// One page of videos, newest first. `page` and `size` start at 1.
    ///
    /// Read paths stay answerable while the store is down: implementations
    /// log the failure and return an empty page rather than an error.
    async fn list_paginated(&self, page: u32, size: u32) -> SearchResult<VideoPage>;

    /// Fuzzy match over title and description, most relevant first.
    async fn search(&self, text: &str) -> SearchResult<VideoPage>;
}

/// Field mapping for the video index.
pub fn video_mappings() -> Value {
    json!({
        "properties": {
            "video_id": { "type": "keyword" },
            "title": { "type": "text", "analyzer": "standard" },
            "description": { "type": "text", "analyzer": "standard" },
            "published_at": { "type": "date" },
            "thumbnails": { "type": "keyword" },
            "indexed_at": { "type": "date" }
        }
    })
}

/// Offset of the first item on `page`.
pub(crate) fn page_offset(page: u32, size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(size.max(1))
}

// =============================================================================
// Elasticsearch
// =============================================================================

/// `VideoIndex` over an Elasticsearch index.
#[derive(Clone)]
pub struct ElasticVideoIndex {
    client: ElasticClient,
}

#[derive(Deserialize)]
struct PublishedAtOnly {
    published_at: DateTime<Utc>,
}

impl ElasticVideoIndex {
    pub fn new(client: ElasticClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ElasticClient {
        &self.client
    }

    /// Decode hit sources, skipping documents that no longer fit the model.
    fn records_from_hits(&self, hits: Vec<Hit>) -> Vec<VideoRecord> {
        hits.into_iter()
            .filter_map(|hit| {
                let source = hit.source?;
                match serde_json::from_value::<VideoRecord>(source) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(
                            index = %self.client.index(),
                            doc_id = ?hit.id,
                            "Skipping undecodable document: {}",
                            e
                        );
                        None
                    }
                }
            })
            .collect()
    }

    async fn total_count(&self) -> SearchResult<u64> {
        match self.client.count(json!({ "match_all": {} })).await {
            Ok(count) => Ok(count),
            Err(e) if e.is_index_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Empty page for a read the store could not answer.
    fn unavailable(&self, operation: &str, err: &SearchError) -> VideoPage {
        if !err.is_index_not_found() {
            error!(
                index = %self.client.index(),
                operation,
                "Elasticsearch unavailable, answering empty: {}",
                err
            );
        }
        VideoPage::empty(0)
    }
}

#[async_trait]
impl VideoIndex for ElasticVideoIndex {
    async fn ping(&self) -> bool {
        self.client.ping().await
    }

    async fn ensure_schema(&self) -> SearchResult<()> {
        if self.client.index_exists().await? {
            debug!(index = %self.client.index(), "Index already exists");
            return Ok(());
        }

        match self.client.create_index(&video_mappings()).await {
            Ok(()) => {
                info!(index = %self.client.index(), "Created index");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(index = %self.client.index(), "Index created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, record: VideoRecord) -> SearchResult<VideoRecord> {
        let record = record.mark_indexed(Utc::now());
        self.client
            .put_document(record.id.as_str(), &record)
            .await?;
        debug!(video_id = %record.id, "Indexed video");
        Ok(record)
    }

    async fn max_published_at(&self) -> SearchResult<Option<DateTime<Utc>>> {
        let request = SearchRequest::match_all(1)
            .sort(sort_by_published_desc())
            .source_fields(&["published_at"]);

        let response = match self.client.search(&request).await {
            Ok(response) => response,
            Err(e) if e.is_index_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(source) = response.hits.hits.into_iter().next().and_then(|h| h.source) else {
            return Ok(None);
        };

        let latest: PublishedAtOnly = serde_json::from_value(source)
            .map_err(|e| SearchError::invalid_response(format!("published_at: {}", e)))?;
        Ok(Some(latest.published_at))
    }

    async fn list_paginated(&self, page: u32, size: u32) -> SearchResult<VideoPage> {
        let from = page_offset(page, size);
        if from >= MAX_RESULT_WINDOW {
            // Beyond the result window the store rejects the query outright.
            return Ok(match self.total_count().await {
                Ok(total) => VideoPage::empty(total),
                Err(e) => self.unavailable("count", &e),
            });
        }
        let size = u64::from(size.max(1)).min(MAX_RESULT_WINDOW - from);

        let request = SearchRequest::match_all(size)
            .from(from)
            .sort(sort_by_published_desc());

        let response = match self.client.search(&request).await {
            Ok(response) => response,
            Err(e) => return Ok(self.unavailable("list", &e)),
        };

        let total = response.hits.total_value();
        Ok(VideoPage::new(self.records_from_hits(response.hits.hits), total))
    }

    async fn search(&self, text: &str) -> SearchResult<VideoPage> {
        let request = SearchRequest::multi_match(text, &SEARCH_FIELDS, SEARCH_RESULT_CAP);

        let response = match self.client.search(&request).await {
            Ok(response) => response,
            Err(e) => return Ok(self.unavailable("search", &e)),
        };

        let total = response.hits.total_value();
        Ok(VideoPage::new(self.records_from_hits(response.hits.hits), total))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ElasticConfig;
    use crate::retry::RetryConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn index_for(server: &MockServer) -> ElasticVideoIndex {
        let client = ElasticClient::new(ElasticConfig {
            host: server.uri(),
            retry: RetryConfig::none(),
            ..ElasticConfig::default()
        })
        .unwrap();
        ElasticVideoIndex::new(client)
    }

    fn index_missing() -> ResponseTemplate {
        ResponseTemplate::new(404).set_body_json(json!({
            "error": { "type": "index_not_found_exception", "reason": "no such index [youtube_videos]" },
            "status": 404
        }))
    }

    fn source(id: &str, published_at: &str) -> Value {
        json!({
            "video_id": id,
            "title": format!("title {}", id),
            "description": "desc",
            "published_at": published_at,
            "thumbnails": "https://i.ytimg.com/vi/x/mqdefault.jpg",
            "indexed_at": "2024-05-01T00:00:00Z"
        })
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(0, 0), 0);
    }

    #[test]
    fn test_mapping_types() {
        let mappings = video_mappings();
        assert_eq!(mappings["properties"]["video_id"]["type"], "keyword");
        assert_eq!(mappings["properties"]["title"]["analyzer"], "standard");
        assert_eq!(mappings["properties"]["published_at"]["type"], "date");
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/youtube_videos"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos"))
            .and(body_partial_json(json!({
                "mappings": { "properties": { "video_id": { "type": "keyword" } } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
            .expect(1)
            .mount(&server)
            .await;

        index_for(&server).ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_tolerates_creation_race() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/youtube_videos"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "type": "resource_already_exists_exception", "reason": "already exists" },
                "status": 400
            })))
            .mount(&server)
            .await;

        index_for(&server).ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_skips_existing_index() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/youtube_videos"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        index_for(&server).ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_writes_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos/_doc/abc123"))
            .and(body_partial_json(json!({ "video_id": "abc123", "title": "Match highlights" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
            .expect(1)
            .mount(&server)
            .await;

        let record = VideoRecord::new(
            "abc123",
            "Match highlights",
            "desc",
            "2024-05-01T10:00:00Z".parse().unwrap(),
            "https://i.ytimg.com/vi/abc123/mqdefault.jpg",
        )
        .unwrap();
        let before = Utc::now();

        let stored = index_for(&server).upsert(record).await.unwrap();
        assert!(stored.indexed_at >= before);
    }

    #[tokio::test]
    async fn test_reupsert_overwrites_same_document() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos/_doc/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "updated" })))
            .expect(2)
            .mount(&server)
            .await;

        let record = VideoRecord::new(
            "abc123",
            "Match highlights",
            "desc",
            "2024-05-01T10:00:00Z".parse().unwrap(),
            "https://i.ytimg.com/vi/abc123/mqdefault.jpg",
        )
        .unwrap();
        let index = index_for(&server);

        let first = index.upsert(record.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = index.upsert(record).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.indexed_at > first.indexed_at);
    }

    #[tokio::test]
    async fn test_upsert_surfaces_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let record = VideoRecord::new(
            "abc123",
            "t",
            "d",
            Utc::now(),
            "https://i.ytimg.com/vi/abc123/mqdefault.jpg",
        )
        .unwrap();

        let err = index_for(&server).upsert(record).await.unwrap_err();
        assert!(matches!(err, SearchError::ServerError(500, _)));
    }

    #[tokio::test]
    async fn test_max_published_at() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .and(body_partial_json(json!({
                "size": 1,
                "sort": [{ "published_at": { "order": "desc" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": { "value": 42, "relation": "eq" },
                    "hits": [ { "_id": "z", "_source": { "published_at": "2024-05-01T10:00:00Z" } } ]
                }
            })))
            .mount(&server)
            .await;

        let latest = index_for(&server).max_published_at().await.unwrap();
        assert_eq!(latest, Some("2024-05-01T10:00:00Z".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_max_published_at_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .respond_with(index_missing())
            .mount(&server)
            .await;

        assert_eq!(index_for(&server).max_published_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_max_published_at_unreachable_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(index_for(&server).max_published_at().await.is_err());
    }

    #[tokio::test]
    async fn test_list_paginated_window_and_total() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .and(body_partial_json(json!({ "from": 10, "size": 10, "track_total_hits": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": { "value": 25, "relation": "eq" },
                    "hits": [
                        { "_id": "a", "_source": source("a", "2024-05-01T10:00:00Z") },
                        { "_id": "b", "_source": source("b", "2024-05-01T09:00:00Z") },
                        { "_id": "broken", "_source": { "video_id": "broken" } }
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = index_for(&server).list_paginated(2, 10).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.len(), 2);
        assert_eq!(page.items[0].id.as_str(), "a");
    }

    #[tokio::test]
    async fn test_list_paginated_missing_index_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .respond_with(index_missing())
            .mount(&server)
            .await;

        let page = index_for(&server).list_paginated(1, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_reads_degrade_when_store_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let index = index_for(&server);

        let page = index.list_paginated(1, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);

        let page = index.list_paginated(2000, 10).await.unwrap();
        assert!(page.is_empty());

        let page = index.search("cricket").await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);

        assert!(index.max_published_at().await.is_err());
    }

    #[tokio::test]
    async fn test_list_beyond_result_window_uses_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 12345 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let page = index_for(&server).list_paginated(1001, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 12345);
    }

    #[tokio::test]
    async fn test_search_uses_fuzzy_multi_match() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .and(body_partial_json(json!({
                "size": 10000,
                "query": { "multi_match": { "query": "crikcet", "fuzziness": "AUTO" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": { "value": 1, "relation": "eq" },
                    "hits": [ { "_id": "a", "_score": 1.3, "_source": source("a", "2024-05-01T10:00:00Z") } ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = index_for(&server).search("crikcet").await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id.as_str(), "a");
    }
}
