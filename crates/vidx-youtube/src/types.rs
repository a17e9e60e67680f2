//! Wire types for the YouTube Data API `search.list` endpoint.

use serde::Deserialize;

use vidx_models::{parse_rfc3339_utc, VideoRecord, DEFAULT_DESCRIPTION, DEFAULT_TITLE};

use crate::error::ItemRejection;

/// `search.list` response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A single search hit. Every field is optional on the wire; validation
/// happens in [`SearchResult::into_record`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub id: Option<ResourceId>,
    #[serde(default)]
    pub snippet: Option<Snippet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub default: Option<Thumbnail>,
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// Preferred thumbnail: medium, then high, then default.
    pub fn preferred_url(&self) -> Option<&str> {
        [&self.medium, &self.high, &self.default]
            .into_iter()
            .filter_map(|t| t.as_ref())
            .filter_map(|t| t.url.as_deref())
            .find(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: Option<String>,
}

impl SearchResult {
    /// Upstream id, if present. Used in log lines for rejected items.
    pub fn video_id(&self) -> Option<&str> {
        self.id
            .as_ref()
            .and_then(|id| id.video_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    /// Validate and convert into a record ready for indexing.
    pub fn into_record(self) -> Result<VideoRecord, ItemRejection> {
        let video_id = self
            .video_id()
            .map(str::to_string)
            .ok_or(ItemRejection::MissingVideoId)?;

        let snippet = self.snippet.unwrap_or_default();
        let published_raw = snippet
            .published_at
            .filter(|s| !s.trim().is_empty())
            .ok_or(ItemRejection::MissingPublishedAt)?;
        let published_at = parse_rfc3339_utc(&published_raw)
            .map_err(|_| ItemRejection::InvalidTimestamp(published_raw.clone()))?;

        let thumbnail = snippet
            .thumbnails
            .as_ref()
            .and_then(Thumbnails::preferred_url)
            .ok_or(ItemRejection::MissingThumbnail)?
            .to_string();

        let record = VideoRecord::new(
            video_id,
            snippet.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            snippet
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            published_at,
            &thumbnail,
        )?;

        Ok(record)
    }
}

/// Google API error envelope: `{"error": {"code", "message", "errors": [...]}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    pub fn first_reason(&self) -> Option<&str> {
        self.error.errors.iter().find_map(|e| e.reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> SearchResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_item_converts() {
        let record = item(json!({
            "id": {"kind": "youtube#video", "videoId": "abc123"},
            "snippet": {
                "publishedAt": "2024-06-01T10:00:00Z",
                "title": "Final over",
                "description": "Last ball six",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/vi/abc123/default.jpg"},
                    "medium": {"url": "https://i.ytimg.com/vi/abc123/mqdefault.jpg"}
                }
            }
        }))
        .into_record()
        .unwrap();

        assert_eq!(record.id.as_str(), "abc123");
        assert_eq!(record.title, "Final over");
        assert!(record.thumbnail_url.as_str().ends_with("mqdefault.jpg"));
    }

    #[test]
    fn test_missing_title_and_description_use_defaults() {
        let record = item(json!({
            "id": {"videoId": "abc123"},
            "snippet": {
                "publishedAt": "2024-06-01T10:00:00Z",
                "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/abc123/hq.jpg"}}
            }
        }))
        .into_record()
        .unwrap();

        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
        assert!(record.thumbnail_url.as_str().ends_with("hq.jpg"));
    }

    #[test]
    fn test_channel_result_without_video_id_is_rejected() {
        let err = item(json!({
            "id": {"kind": "youtube#channel", "channelId": "UC123"},
            "snippet": {"publishedAt": "2024-06-01T10:00:00Z"}
        }))
        .into_record()
        .unwrap_err();

        assert_eq!(err, ItemRejection::MissingVideoId);
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let err = item(json!({
            "id": {"videoId": "abc123"},
            "snippet": {"publishedAt": "last tuesday"}
        }))
        .into_record()
        .unwrap_err();

        assert!(matches!(err, ItemRejection::InvalidTimestamp(_)));
    }

    #[test]
    fn test_missing_thumbnail_is_rejected() {
        let err = item(json!({
            "id": {"videoId": "abc123"},
            "snippet": {"publishedAt": "2024-06-01T10:00:00Z", "thumbnails": {}}
        }))
        .into_record()
        .unwrap_err();

        assert_eq!(err, ItemRejection::MissingThumbnail);
    }

    #[test]
    fn test_error_envelope_reason() {
        let envelope: ErrorEnvelope = serde_json::from_value(json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [{"reason": "quotaExceeded", "domain": "youtube.quota"}]
            }
        }))
        .unwrap();

        assert_eq!(envelope.first_reason(), Some("quotaExceeded"));
    }
}
