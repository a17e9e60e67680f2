//! Video fetch-and-index service.
//!
//! This crate provides:
//! - The background fetch loop that keeps the index current
//! - The read API: `/videos`, `/search`, `/health`
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, FetchConfig, SearchBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{FetchScheduler, FetchSchedulerHandle, QueryService};
pub use state::AppState;
