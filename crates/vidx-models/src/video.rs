//! Video record model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Title used when upstream omits one.
pub const DEFAULT_TITLE: &str = "No Title";

/// Description used when upstream omits one.
pub const DEFAULT_DESCRIPTION: &str = "No Description";

/// Upstream-assigned video identifier. Doubles as the document id in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A video as stored in the search index and returned by the read API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Upstream video ID (document primary key)
    #[serde(rename = "video_id")]
    pub id: VideoId,

    /// Video title
    pub title: String,

    /// Video description
    pub description: String,

    /// Publication timestamp assigned upstream. Never changes for a given id.
    pub published_at: DateTime<Utc>,

    /// Thumbnail URL
    #[serde(rename = "thumbnails")]
    pub thumbnail_url: Url,

    /// Time the record was last written to the index
    #[serde(default = "Utc::now")]
    pub indexed_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Build a validated record.
    ///
    /// `indexed_at` starts at the current time; the index overwrites it on write.
    pub fn new(
        id: impl Into<VideoId>,
        title: impl Into<String>,
        description: impl Into<String>,
        published_at: DateTime<Utc>,
        thumbnail_url: &str,
    ) -> ModelResult<Self> {
        let record = Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            published_at,
            thumbnail_url: parse_thumbnail_url(thumbnail_url)?,
            indexed_at: Utc::now(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the invariants a record must satisfy before it is indexed.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.is_empty() {
            return Err(ModelError::MissingField("video_id"));
        }
        check_web_url(&self.thumbnail_url)
    }

    /// Stamp the record with the time it was written.
    pub fn mark_indexed(mut self, at: DateTime<Utc>) -> Self {
        self.indexed_at = at;
        self
    }
}

fn parse_thumbnail_url(raw: &str) -> ModelResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ModelError::MissingField("thumbnails"));
    }
    let url = Url::parse(raw).map_err(|e| ModelError::invalid_url(raw, e.to_string()))?;
    check_web_url(&url)?;
    Ok(url)
}

fn check_web_url(url: &Url) -> ModelResult<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ModelError::invalid_url(url.as_str(), "scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ModelError::invalid_url(url.as_str(), "missing host"));
    }
    Ok(())
}
