//! Video index backed by Elasticsearch.
//!
//! This crate provides:
//! - An Elasticsearch REST client with retry, tracing spans and metrics
//! - The `VideoIndex` trait: schema setup, upsert by id, watermark lookup,
//!   recency-sorted pagination and fuzzy multi-field search
//! - `ElasticVideoIndex` for production and `MemoryVideoIndex` for tests
//!   and local runs

pub mod client;
pub mod error;
pub mod fuzzy;
pub mod index;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod types;

pub use client::{ElasticClient, ElasticConfig};
pub use error::{SearchError, SearchResult, Transience};
pub use index::{ElasticVideoIndex, VideoIndex, MAX_RESULT_WINDOW, SEARCH_RESULT_CAP};
pub use memory::MemoryVideoIndex;
pub use retry::{Operation, RetryConfig};
