//! YouTube Data API client.
//!
//! This crate provides:
//! - Round-robin API key rotation
//! - A `search.list` client that fetches videos newer than a watermark
//! - Per-item validation of upstream results into `VideoRecord`s
//! - Typed classification of quota, auth, upstream and network failures

pub mod client;
pub mod error;
pub mod key_rotator;
pub mod metrics;
pub mod source;
pub mod types;

pub use client::{YouTubeClient, YouTubeConfig, MAX_RESULTS, PUBLISHED_AFTER_BUFFER_SECS};
pub use error::{ItemRejection, YouTubeError, YouTubeResult};
pub use key_rotator::{ApiKey, KeyRotator};
pub use source::{FetchBatch, VideoSource};
