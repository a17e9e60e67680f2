//! Elasticsearch error types.

use thiserror::Error;

/// Result type for index operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while talking to the document store.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    /// Thread pool queue full or circuit breaker tripped.
    #[error("Request rejected by cluster: {0}")]
    Rejected(String),

    /// Index or cluster blocked, typically read-only after the disk flood stage.
    #[error("Cluster block: {0}")]
    ClusterBlocked(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status and response body to an error.
    ///
    /// The body's `error.type` distinguishes missing indices and creation
    /// races from other 4xx responses.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let error_type = error_type(&body);

        match (status, error_type.as_deref()) {
            (_, Some("index_not_found_exception")) => Self::IndexNotFound(body),
            (_, Some("resource_already_exists_exception")) => Self::AlreadyExists(body),
            (_, Some("es_rejected_execution_exception" | "circuit_breaking_exception")) => {
                Self::Rejected(body)
            }
            (_, Some("cluster_block_exception")) => Self::ClusterBlocked(body),
            (401 | 403, _) => Self::Unauthorized(body),
            (404, _) => Self::IndexNotFound(body),
            (409, _) => Self::AlreadyExists(body),
            (429, _) => Self::RateLimited(0),
            (400, _) => Self::BadRequest(body),
            (500..=599, _) => Self::ServerError(status, body),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// How the retry loop should treat this failure.
    pub fn transience(&self) -> Transience {
        match self {
            SearchError::RateLimited(_) | SearchError::Rejected(_) => Transience::Backpressure,
            SearchError::ServerError(_, _) | SearchError::Network(_) => Transience::Unavailable,
            _ => Transience::Permanent,
        }
    }

    pub fn is_index_not_found(&self) -> bool {
        matches!(self, SearchError::IndexNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, SearchError::AlreadyExists(_))
    }

    /// HTTP status associated with the error, for metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SearchError::IndexNotFound(_) => Some(404),
            SearchError::AlreadyExists(_) => Some(400),
            SearchError::Unauthorized(_) => Some(401),
            SearchError::BadRequest(_) => Some(400),
            SearchError::RateLimited(_) | SearchError::Rejected(_) => Some(429),
            SearchError::ClusterBlocked(_) => Some(403),
            SearchError::ServerError(status, _) => Some(*status),
            SearchError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested delay before retrying, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SearchError::RateLimited(ms) if *ms > 0 => Some(*ms),
            _ => None,
        }
    }
}

/// Retry classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    /// The cluster is shedding load; back off harder.
    Backpressure,
    /// Node, shard or connection unavailable.
    Unavailable,
    /// Another attempt gets the same answer.
    Permanent,
}

impl Transience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transience::Backpressure => "backpressure",
            Transience::Unavailable => "unavailable",
            Transience::Permanent => "permanent",
        }
    }
}

/// Extract `error.type` from an Elasticsearch error body.
fn error_type(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("type"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}
