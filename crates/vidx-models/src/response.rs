//! Query results and the list envelope returned by the read API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoRecord;

/// A window of records plus the total number of matches in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoPage {
    pub items: Vec<VideoRecord>,
    pub total: u64,
}

impl VideoPage {
    pub fn new(items: Vec<VideoRecord>, total: u64) -> Self {
        Self { items, total }
    }

    /// An empty window that still reports the real total.
    pub fn empty(total: u64) -> Self {
        Self {
            items: Vec::new(),
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Response body for `/videos` and `/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoListResponse {
    /// Total number of videos matching the criteria
    pub total: u64,
    /// Page number echoed back (always 1 for search)
    pub page: u32,
    /// Number of videos in this response
    pub size: usize,
    pub videos: Vec<VideoRecord>,
}

impl VideoListResponse {
    pub fn from_page(page_number: u32, page: VideoPage) -> Self {
        Self {
            total: page.total,
            page: page_number,
            size: page.items.len(),
            videos: page.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_size_counts_returned_items() {
        let response = VideoListResponse::from_page(4, VideoPage::empty(31));
        assert_eq!(response.total, 31);
        assert_eq!(response.page, 4);
        assert_eq!(response.size, 0);
        assert!(response.videos.is_empty());
    }
}
