//! Scheduler
//!
//! Named recurring jobs with optional execution limits:
//! - Order status poll every 20 seconds
//! - Hourly health check at HH:15 IST, retired after a fixed number of runs

mod cadence;
pub mod jobs;
mod runner;

pub use cadence::Cadence;
pub use jobs::{register_default_jobs, HealthReport, HEALTH_CHECK_JOB, ORDER_STATUS_JOB};
pub use runner::{FireOutcome, JobContext, JobRunner};
