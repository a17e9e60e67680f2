//! YouTube client error types.

use thiserror::Error;

use vidx_models::ModelError;

pub type YouTubeResult<T> = Result<T, YouTubeError>;

/// Failure of a whole `search.list` call.
#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("Quota exceeded or access forbidden: {0}")]
    QuotaExceeded(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl YouTubeError {
    /// Classify a non-success HTTP response.
    ///
    /// `reason` is the first `error.errors[].reason` from the body, if any.
    pub fn from_http_status(status: u16, reason: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        let quota_reason = matches!(
            reason,
            Some("quotaExceeded" | "rateLimitExceeded" | "dailyLimitExceeded" | "userRateLimitExceeded")
        );

        match status {
            403 | 429 => Self::QuotaExceeded(message),
            _ if quota_reason => Self::QuotaExceeded(message),
            401 => Self::Unauthorized(message),
            400 if reason == Some("keyInvalid") => Self::Unauthorized(message),
            _ => Self::Upstream { status, message },
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, YouTubeError::QuotaExceeded(_))
    }

    /// Short label used for metrics and cycle reports.
    pub fn kind(&self) -> &'static str {
        match self {
            YouTubeError::QuotaExceeded(_) => "quota_exceeded",
            YouTubeError::Unauthorized(_) => "unauthorized",
            YouTubeError::Upstream { .. } => "upstream_error",
            YouTubeError::Network(_) => "network_error",
            YouTubeError::Parse(_) => "parse_error",
        }
    }
}

/// Why a single upstream item was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemRejection {
    #[error("missing videoId")]
    MissingVideoId,

    #[error("missing publishedAt")]
    MissingPublishedAt,

    #[error("unparsable publishedAt '{0}'")]
    InvalidTimestamp(String),

    #[error("no usable thumbnail")]
    MissingThumbnail,

    #[error("invalid record: {0}")]
    Invalid(#[from] ModelError),
}

impl ItemRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            ItemRejection::MissingVideoId => "missing_video_id",
            ItemRejection::MissingPublishedAt => "missing_published_at",
            ItemRejection::InvalidTimestamp(_) => "invalid_timestamp",
            ItemRejection::MissingThumbnail => "missing_thumbnail",
            ItemRejection::Invalid(_) => "invalid_record",
        }
    }
}
