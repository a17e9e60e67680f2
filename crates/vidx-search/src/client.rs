//! Elasticsearch REST client.
//!
//! - HTTP client tuning (pooling, timeouts)
//! - Optional basic auth
//! - Per-operation retry driven by the cluster's `error.type`
//! - Observability (tracing spans, metrics)

use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use crate::error::{SearchError, SearchResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, Operation, RetryConfig};
use crate::types::{CountRequest, CountResponse, SearchRequest, SearchResponse};

// =============================================================================
// Configuration
// =============================================================================

pub const DEFAULT_HOST: &str = "http://localhost:9200";
pub const DEFAULT_INDEX: &str = "youtube_videos";

/// Elasticsearch client configuration.
#[derive(Clone)]
pub struct ElasticConfig {
    /// Base URL, without trailing slash
    pub host: String,
    /// Index holding video documents
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl std::fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticConfig")
            .field("host", &self.host)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            index: DEFAULT_INDEX.to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl ElasticConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let host = std::env::var("ELASTICSEARCH_HOST")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let index = std::env::var("ELASTICSEARCH_INDEX")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX.to_string());

        let timeout_secs: u64 = std::env::var("ELASTICSEARCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            host,
            index,
            username: std::env::var("ELASTICSEARCH_USERNAME").ok().filter(|s| !s.is_empty()),
            password: std::env::var("ELASTICSEARCH_PASSWORD").ok(),
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::from_env(),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Elasticsearch REST client scoped to one index.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    config: ElasticConfig,
}

impl ElasticClient {
    pub fn new(config: ElasticConfig) -> SearchResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vidx-search/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SearchError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> SearchResult<Self> {
        Self::new(ElasticConfig::from_env())
    }

    pub fn index(&self) -> &str {
        &self.config.index
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.config.host, self.config.index)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    // =========================================================================
    // Cluster
    // =========================================================================

    /// Whether the cluster answers its root endpoint. Never retried.
    pub async fn ping(&self) -> bool {
        let start = Instant::now();
        let result = self
            .request(Method::GET, &self.config.host)
            .send()
            .instrument(info_span!("elasticsearch_request", operation = "ping"))
            .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        match result {
            Ok(response) => {
                let status = response.status();
                record_request("ping", status.as_u16(), latency_ms);
                status.is_success()
            }
            Err(e) => {
                debug!("Elasticsearch ping failed: {}", e);
                record_request("ping", e.status().map(|s| s.as_u16()).unwrap_or(503), latency_ms);
                false
            }
        }
    }

    // =========================================================================
    // Index management
    // =========================================================================

    pub async fn index_exists(&self) -> SearchResult<bool> {
        let url = self.index_url();
        let url = &url;

        self.execute_request(Operation::IndexExists, move || async move {
            let response = self.request(Method::HEAD, url).send().await?;
            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(Self::handle_error_response(status, response).await),
            }
        })
        .await
    }

    /// Create the index with the given mappings.
    ///
    /// Returns `SearchError::AlreadyExists` if another writer created it first.
    pub async fn create_index(&self, mappings: &Value) -> SearchResult<()> {
        let url = self.index_url();
        let url = &url;
        let body = serde_json::json!({ "mappings": mappings });
        let body = &body;

        self.execute_request(Operation::CreateIndex, move || async move {
            let response = self.request(Method::PUT, url).json(body).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(Self::handle_error_response(status, response).await)
            }
        })
        .await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Create or overwrite the document with the given id.
    pub async fn put_document<T: Serialize + Sync>(&self, id: &str, doc: &T) -> SearchResult<()> {
        let url = format!("{}/_doc/{}", self.index_url(), urlencoding::encode(id));
        let url = &url;

        self.execute_request(Operation::PutDocument, move || async move {
            let response = self.request(Method::PUT, url).json(doc).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(Self::handle_error_response(status, response).await)
            }
        })
        .await
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        let url = format!("{}/_search", self.index_url());
        let url = &url;

        self.execute_request(Operation::Search, move || async move {
            let response = self.request(Method::POST, url).json(request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Self::handle_error_response(status, response).await);
            }

            let text = response.text().await?;
            serde_json::from_str(&text).map_err(|e| {
                SearchError::invalid_response(format!("search response: {}", e))
            })
        })
        .await
    }

    pub async fn count(&self, query: Value) -> SearchResult<u64> {
        let url = format!("{}/_count", self.index_url());
        let url = &url;
        let body = CountRequest { query };
        let body = &body;

        self.execute_request(Operation::Count, move || async move {
            let response = self.request(Method::POST, url).json(body).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Self::handle_error_response(status, response).await);
            }

            let count: CountResponse = response
                .json()
                .await
                .map_err(|e| SearchError::invalid_response(format!("count response: {}", e)))?;
            Ok(count.count)
        })
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run `op` with retry inside a request span and record its metrics.
    async fn execute_request<T, F, Fut>(&self, operation: Operation, op: F) -> SearchResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SearchResult<T>>,
    {
        let span = info_span!(
            "elasticsearch_request",
            operation = operation.as_str(),
            index = %self.config.index
        );

        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, op)
            .instrument(span)
            .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation.as_str(), status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> SearchError {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let body = response.text().await.unwrap_or_default();
        match SearchError::from_http_status(status.as_u16(), body) {
            SearchError::RateLimited(_) => SearchError::RateLimited(retry_after_ms.unwrap_or(0)),
            other => other,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ElasticClient {
        ElasticClient::new(ElasticConfig {
            host: server.uri(),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            ..ElasticConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cluster_name": "docker-cluster"
            })))
            .mount(&server)
            .await;

        assert!(test_client(&server).ping().await);
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let client = ElasticClient::new(ElasticConfig {
            host: "http://127.0.0.1:1".to_string(),
            ..ElasticConfig::default()
        })
        .unwrap();

        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn test_index_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/youtube_videos"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(!test_client(&server).index_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_basic_auth_header_sent() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/youtube_videos"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(ElasticConfig {
            host: server.uri(),
            username: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            ..ElasticConfig::default()
        })
        .unwrap();

        assert!(client.index_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_put_document_encodes_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos/_doc/a%2Fb"))
            .and(body_partial_json(serde_json::json!({ "title": "t" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server)
            .put_document("a/b", &serde_json::json!({ "title": "t" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_count"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "count": 7 })))
            .mount(&server)
            .await;

        let count = test_client(&server)
            .count(serde_json::json!({ "match_all": {} }))
            .await
            .unwrap();
        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn test_put_document_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/youtube_videos/_doc/abc"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .put_document("abc", &serde_json::json!({ "title": "t" }))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::ServerError(503, _)));
    }

    #[tokio::test]
    async fn test_missing_index_on_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtube_videos/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "type": "index_not_found_exception", "reason": "no such index" },
                "status": 404
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .search(&SearchRequest::match_all(1))
            .await
            .unwrap_err();
        assert!(err.is_index_not_found());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("ELASTICSEARCH_HOST", "http://es.internal:9200/");
        std::env::set_var("ELASTICSEARCH_INDEX", "videos_v2");
        std::env::set_var("ELASTICSEARCH_PASSWORD", "secret");

        let config = ElasticConfig::from_env();
        assert_eq!(config.host, "http://es.internal:9200");
        assert_eq!(config.index, "videos_v2");
        assert!(!format!("{:?}", config).contains("secret"));

        std::env::remove_var("ELASTICSEARCH_HOST");
        std::env::remove_var("ELASTICSEARCH_INDEX");
        std::env::remove_var("ELASTICSEARCH_PASSWORD");

        let config = ElasticConfig::from_env();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.index, DEFAULT_INDEX);
    }
}
