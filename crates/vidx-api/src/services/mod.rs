//! Business logic services.

pub mod fetch_scheduler;
pub mod query;

pub use fetch_scheduler::{CycleOutcome, CycleReport, FetchScheduler, FetchSchedulerHandle, SchedulerState};
pub use query::QueryService;
