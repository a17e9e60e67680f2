//! Shared data models for the vidx video indexer.
//!
//! This crate provides Serde-serializable types for:
//! - Indexed video records and their validation
//! - Paged query results and the HTTP list envelope
//! - RFC 3339 timestamp helpers used for the fetch watermark

pub mod error;
pub mod response;
pub mod timestamp;
pub mod video;

pub use error::{ModelError, ModelResult};
pub use response::{VideoListResponse, VideoPage};
pub use timestamp::{format_rfc3339_seconds, parse_rfc3339_utc};
pub use video::{VideoId, VideoRecord, DEFAULT_DESCRIPTION, DEFAULT_TITLE};
