//! In-process `VideoIndex` for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use vidx_models::{VideoId, VideoPage, VideoRecord};

use crate::error::SearchResult;
use crate::fuzzy::{best_fields_score, tokenize};
use crate::index::{page_offset, VideoIndex, SEARCH_RESULT_CAP};

/// Videos keyed by id behind a `RwLock`.
#[derive(Default)]
pub struct MemoryVideoIndex {
    videos: RwLock<HashMap<VideoId, VideoRecord>>,
}

impl MemoryVideoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.videos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.videos.read().await.is_empty()
    }

    pub async fn get(&self, id: &VideoId) -> Option<VideoRecord> {
        self.videos.read().await.get(id).cloned()
    }
}

/// Newest first; ties broken by id so pages are stable.
fn by_recency(a: &VideoRecord, b: &VideoRecord) -> std::cmp::Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

#[async_trait]
impl VideoIndex for MemoryVideoIndex {
    async fn ping(&self) -> bool {
        true
    }

    async fn ensure_schema(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn upsert(&self, record: VideoRecord) -> SearchResult<VideoRecord> {
        let record = record.mark_indexed(Utc::now());
        self.videos
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn max_published_at(&self) -> SearchResult<Option<DateTime<Utc>>> {
        Ok(self
            .videos
            .read()
            .await
            .values()
            .map(|v| v.published_at)
            .max())
    }

    async fn list_paginated(&self, page: u32, size: u32) -> SearchResult<VideoPage> {
        let videos = self.videos.read().await;
        let total = videos.len() as u64;

        let mut sorted: Vec<&VideoRecord> = videos.values().collect();
        sorted.sort_by(|a, b| by_recency(a, b));

        let from = usize::try_from(page_offset(page, size)).unwrap_or(usize::MAX);
        let items = sorted
            .into_iter()
            .skip(from)
            .take(size.max(1) as usize)
            .cloned()
            .collect();

        Ok(VideoPage::new(items, total))
    }

    async fn search(&self, text: &str) -> SearchResult<VideoPage> {
        let terms = tokenize(text);
        if terms.is_empty() {
            return Ok(VideoPage::empty(0));
        }

        let videos = self.videos.read().await;
        let mut scored: Vec<(usize, &VideoRecord)> = videos
            .values()
            .filter_map(|video| {
                let score = best_fields_score(&terms, &[&video.title, &video.description]);
                (score > 0).then_some((score, video))
            })
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| by_recency(a, b)));

        let total = scored.len() as u64;
        let items = scored
            .into_iter()
            .take(SEARCH_RESULT_CAP as usize)
            .map(|(_, video)| video.clone())
            .collect();

        Ok(VideoPage::new(items, total))
    }
}
