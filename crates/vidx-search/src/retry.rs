//! Per-operation retry for cluster requests.
//!
//! A failed request is classified by [`Transience`] (derived from the
//! Elasticsearch `error.type`, falling back to the HTTP status). Each
//! [`Operation`] decides which classes it retries and how many times.
//! Backpressure waits longer than plain unavailability so rejected thread
//! pools get a chance to drain.

use std::time::Duration;

use rand::Rng;
use tracing::{info_span, warn, Instrument};

use crate::error::{SearchResult, Transience};
use crate::metrics::record_retry;

/// Backoff multiplier applied when the cluster is shedding load.
const BACKPRESSURE_FACTOR: u64 = 4;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt, before per-operation limits.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Ceiling for any single wait, including server-provided `Retry-After`.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// `ELASTICSEARCH_RETRY_BASE_MS` / `ELASTICSEARCH_RETRY_MAX_MS`, defaults otherwise.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |name: &str, fallback: u64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            base_delay_ms: millis("ELASTICSEARCH_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: millis("ELASTICSEARCH_RETRY_MAX_MS", defaults.max_delay_ms),
            ..defaults
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Requests the client issues against the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    IndexExists,
    CreateIndex,
    PutDocument,
    Search,
    Count,
}

impl Operation {
    /// Metric and span label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::IndexExists => "index_exists",
            Operation::CreateIndex => "create_index",
            Operation::PutDocument => "put_document",
            Operation::Search => "search",
            Operation::Count => "count",
        }
    }

    fn retries_on(&self, transience: Transience) -> bool {
        match (self, transience) {
            (_, Transience::Permanent) => false,
            // Schema setup happens at startup; a saturated cluster should fail it fast.
            (Operation::CreateIndex, Transience::Backpressure) => false,
            _ => true,
        }
    }

    fn retry_budget(&self, config: &RetryConfig) -> u32 {
        match self {
            // Writes run inside a fetch cycle that must finish before the next tick.
            Operation::PutDocument | Operation::CreateIndex => config.max_retries.min(1),
            Operation::IndexExists | Operation::Search | Operation::Count => config.max_retries,
        }
    }
}

/// Run `op`, retrying the failures `operation` treats as transient.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: Operation, op: F) -> SearchResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = SearchResult<T>>,
{
    let budget = operation.retry_budget(config);
    let mut attempt = 0;

    loop {
        let span = info_span!("elasticsearch_attempt", operation = operation.as_str(), attempt = attempt + 1);
        let err = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let transience = err.transience();
        if attempt >= budget || !operation.retries_on(transience) {
            return Err(err);
        }

        let delay = backoff(config, attempt, transience, err.retry_after_ms());
        warn!(
            operation = operation.as_str(),
            attempt = attempt + 1,
            reason = transience.as_str(),
            delay_ms = delay.as_millis() as u64,
            "Elasticsearch request failed, retrying: {}",
            err
        );
        record_retry(operation.as_str(), transience.as_str());

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Wait before the retry following `attempt` (0-based).
///
/// Equal jitter: a uniform draw from the upper half of the exponential step.
fn backoff(config: &RetryConfig, attempt: u32, transience: Transience, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after.min(config.max_delay_ms));
    }

    let base = match transience {
        Transience::Backpressure => config.base_delay_ms.saturating_mul(BACKPRESSURE_FACTOR),
        _ => config.base_delay_ms,
    };
    let ceiling = base
        .saturating_mul(1u64 << attempt.min(20))
        .min(config.max_delay_ms);

    Duration::from_millis(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
}
