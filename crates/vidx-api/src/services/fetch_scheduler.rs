//! Background loop that pulls new videos upstream and indexes them.
//!
//! Each cycle:
//! - reads the newest `published_at` already indexed (the watermark)
//! - takes the next API key from the rotator
//! - fetches videos published after the watermark
//! - upserts every valid record, isolating per-record failures
//!
//! Failures never end the loop; only an explicit shutdown does.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vidx_search::VideoIndex;
use vidx_youtube::{KeyRotator, VideoSource, YouTubeError};

use crate::config::FetchConfig;
use crate::metrics::record_fetch_cycle;

/// Lifecycle of the fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    StopRequested,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch succeeded; records were indexed (possibly zero).
    Completed,
    /// Watermark could not be read; nothing was fetched.
    StoreUnavailable,
    /// No API key available.
    CredentialExhausted,
    QuotaExceeded,
    Unauthorized,
    UpstreamError,
    NetworkError,
    ParseError,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::StoreUnavailable => "store_unavailable",
            CycleOutcome::CredentialExhausted => "credential_exhausted",
            CycleOutcome::QuotaExceeded => "quota_exceeded",
            CycleOutcome::Unauthorized => "unauthorized",
            CycleOutcome::UpstreamError => "upstream_error",
            CycleOutcome::NetworkError => "network_error",
            CycleOutcome::ParseError => "parse_error",
        }
    }
}

impl From<&YouTubeError> for CycleOutcome {
    fn from(err: &YouTubeError) -> Self {
        match err {
            YouTubeError::QuotaExceeded(_) => CycleOutcome::QuotaExceeded,
            YouTubeError::Unauthorized(_) => CycleOutcome::Unauthorized,
            YouTubeError::Upstream { .. } => CycleOutcome::UpstreamError,
            YouTubeError::Network(_) => CycleOutcome::NetworkError,
            YouTubeError::Parse(_) => CycleOutcome::ParseError,
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Valid records returned upstream
    pub fetched: usize,
    /// Upstream items rejected by validation
    pub dropped: usize,
    /// Records written to the index
    pub indexed: usize,
    /// Records the index refused
    pub failed: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn empty(outcome: CycleOutcome) -> Self {
        Self {
            fetched: 0,
            dropped: 0,
            indexed: 0,
            failed: 0,
            outcome,
        }
    }
}

/// Periodic fetch-and-index loop.
pub struct FetchScheduler {
    config: FetchConfig,
    source: Arc<dyn VideoSource>,
    index: Arc<dyn VideoIndex>,
    keys: Arc<KeyRotator>,
}

impl FetchScheduler {
    pub fn new(
        config: FetchConfig,
        source: Arc<dyn VideoSource>,
        index: Arc<dyn VideoIndex>,
        keys: Arc<KeyRotator>,
    ) -> Self {
        Self {
            config,
            source,
            index,
            keys,
        }
    }

    /// Run a single cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let watermark = match self.index.max_published_at().await {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!("Skipping fetch cycle, could not read watermark: {}", e);
                return CycleReport::empty(CycleOutcome::StoreUnavailable);
            }
        };

        let Some(key) = self.keys.next() else {
            warn!(
                "No YouTube API key available, cooling down for {:?}",
                self.config.cooldown()
            );
            return CycleReport::empty(CycleOutcome::CredentialExhausted);
        };

        debug!(
            query = %self.config.search_query,
            watermark = ?watermark,
            key = %key,
            "Fetching videos"
        );

        let batch = match self
            .source
            .fetch(&self.config.search_query, &key, watermark)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                let outcome = CycleOutcome::from(&e);
                warn!(outcome = %outcome, key = %key, "Fetch failed: {}", e);
                return CycleReport::empty(outcome);
            }
        };

        let mut report = CycleReport {
            fetched: batch.videos.len(),
            dropped: batch.dropped,
            indexed: 0,
            failed: 0,
            outcome: CycleOutcome::Completed,
        };

        for video in batch.videos {
            let video_id = video.id.clone();
            match self.index.upsert(video).await {
                Ok(_) => report.indexed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(video_id = %video_id, "Failed to index video: {}", e);
                }
            }
        }

        if report.fetched > 0 || report.dropped > 0 {
            info!(
                fetched = report.fetched,
                dropped = report.dropped,
                indexed = report.indexed,
                failed = report.failed,
                "Fetch cycle complete"
            );
        } else {
            debug!("No new videos");
        }

        report
    }

    /// Delay before the next cycle.
    fn pause_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::CredentialExhausted => self.config.cooldown(),
            _ => self.config.interval,
        }
    }

    /// Spawn the loop on the current runtime.
    pub fn start(self) -> FetchSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
        let state_tx = Arc::new(state_tx);

        info!(
            query = %self.config.search_query,
            interval = ?self.config.interval,
            keys = self.keys.len(),
            "Starting fetch scheduler"
        );

        let scheduler = Arc::new(self);
        let task = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx, Arc::clone(&state_tx)));

        FetchSchedulerHandle {
            shutdown: shutdown_tx,
            state_tx,
            state: state_rx,
            task,
        }
    }

    async fn run(
        self: Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
        state_tx: Arc<watch::Sender<SchedulerState>>,
    ) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let start = Instant::now();
            let pause = match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(report) => {
                    record_fetch_cycle(
                        report.outcome.as_str(),
                        report.indexed,
                        report.dropped,
                        report.failed,
                        start.elapsed().as_secs_f64(),
                    );
                    self.pause_after(report.outcome)
                }
                Err(_) => {
                    error!("Fetch cycle panicked, continuing after {:?}", self.config.interval);
                    record_fetch_cycle("panicked", 0, 0, 0, start.elapsed().as_secs_f64());
                    self.config.interval
                }
            };

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // Handle dropped without an explicit shutdown
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        state_tx.send_replace(SchedulerState::Stopped);
        info!("Fetch scheduler stopped");
    }
}

/// Control handle for a running `FetchScheduler`.
pub struct FetchSchedulerHandle {
    shutdown: watch::Sender<bool>,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl FetchSchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Ask the loop to stop and wait up to `grace` for it, aborting after.
    pub async fn shutdown(self, grace: Duration) {
        info!("Stopping fetch scheduler (grace {:?})", grace);
        self.state_tx.send_replace(SchedulerState::StopRequested);
        let _ = self.shutdown.send(true);

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Fetch scheduler task failed: {}", e),
            Err(_) => {
                warn!("Fetch scheduler did not stop within {:?}, aborting", grace);
                task.abort();
            }
        }

        self.state_tx.send_replace(SchedulerState::Stopped);
    }
}

// =============================================================================
// Tests
// =============================================================================
