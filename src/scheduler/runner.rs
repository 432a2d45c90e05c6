//! Recurring job runner
//!
//! Each registered job gets its own driver task that sleeps until the
//! cadence says it is due and then fires the job. A fire increments the
//! execution count, runs the action and, once the action has returned,
//! compares the count with the job's limit. A capped job is removed from
//! the active set in the same critical section, so it can never fire again.
//!
//! Actions must not call `fire` for their own job; that would wait on the
//! lock they are running under. Calling `remove` is fine.

use super::cadence::Cadence;
use crate::error::{AppError, Result};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type JobAction = Arc<dyn Fn(JobContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Passed to the action on every fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    /// Executions so far, including this one
    pub count: u32,
    pub limit: Option<u32>,
}

impl JobContext {
    /// Whether this is the last execution before the job is removed
    pub fn is_final(&self) -> bool {
        self.limit.is_some_and(|limit| self.count >= limit)
    }
}

/// Result of a single fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The action ran; the job stays active
    Ran { count: u32 },
    /// The action ran and the job reached its limit and was removed
    Capped { count: u32 },
    /// Nothing ran: unknown, removed, capped, or runner shutting down
    Skipped,
}

struct JobEntry {
    id: String,
    cadence: Cadence,
    limit: Option<u32>,
    action: JobAction,
    /// Held for the whole fire: count, action and removal decision
    fire_lock: tokio::sync::Mutex<()>,
    count: AtomicU32,
    retired: AtomicBool,
    driven: AtomicBool,
    cancel: CancellationToken,
}

impl JobEntry {
    fn new(
        id: &str,
        cadence: Cadence,
        limit: Option<u32>,
        action: JobAction,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: id.to_string(),
            cadence,
            limit,
            action,
            fire_lock: tokio::sync::Mutex::new(()),
            count: AtomicU32::new(0),
            retired: AtomicBool::new(false),
            driven: AtomicBool::new(false),
            cancel,
        }
    }
}

struct Inner {
    jobs: DashMap<String, Arc<JobEntry>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    drivers: Mutex<Vec<JoinHandle<()>>>,
}

/// Scheduler for named recurring jobs. Clones share the same registry.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                shutdown: CancellationToken::new(),
                started: AtomicBool::new(false),
                drivers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a job. `limit = None` runs it until removed or shutdown.
    ///
    /// If the runner is already started the job is scheduled immediately.
    pub fn register<F, Fut>(
        &self,
        id: &str,
        cadence: Cadence,
        limit: Option<u32>,
        action: F,
    ) -> Result<()>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.inner.shutdown.is_cancelled() {
            return Err(AppError::Validation("Scheduler has been shut down".to_string()));
        }
        if limit == Some(0) {
            return Err(AppError::Validation(format!(
                "Job '{}' must be allowed at least one execution",
                id
            )));
        }
        cadence.validate()?;

        let entry = Arc::new(JobEntry::new(
            id,
            cadence,
            limit,
            Arc::new(move |ctx| action(ctx).boxed()),
            self.inner.shutdown.child_token(),
        ));

        match self.inner.jobs.entry(id.to_string()) {
            Entry::Occupied(_) => return Err(AppError::DuplicateJob(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
            }
        }

        match limit {
            Some(limit) => info!("Registered job '{}' ({}, limit {})", id, cadence, limit),
            None => info!("Registered job '{}' ({})", id, cadence),
        }

        if self.inner.started.load(Ordering::SeqCst) {
            self.spawn_driver(entry);
        }

        Ok(())
    }

    /// Start driving every registered job on its cadence
    pub fn start(&self) {
        if self.inner.shutdown.is_cancelled() || self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Starting scheduler for periodic tasks");

        let entries: Vec<Arc<JobEntry>> =
            self.inner.jobs.iter().map(|e| e.value().clone()).collect();
        for entry in entries {
            self.spawn_driver(entry);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && !self.inner.shutdown.is_cancelled()
    }

    /// Fire a job once, outside its cadence
    pub async fn fire(&self, id: &str) -> FireOutcome {
        let Some(job) = self.inner.jobs.get(id).map(|e| e.value().clone()) else {
            debug!("Job '{}' is not registered", id);
            return FireOutcome::Skipped;
        };
        self.fire_entry(&job).await
    }

    /// Remove a job. Removing an unknown job is a no-op.
    ///
    /// Returns whether a job was removed.
    pub fn remove(&self, id: &str) -> bool {
        match self.inner.jobs.remove(id) {
            Some((_, job)) => {
                job.cancel.cancel();
                info!("Removed job '{}'", id);
                true
            }
            None => {
                debug!("Job '{}' not registered; nothing to remove", id);
                false
            }
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.inner.jobs.contains_key(id)
    }

    /// Identifiers of active jobs, sorted
    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.jobs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn execution_count(&self, id: &str) -> Option<u32> {
        self.inner
            .jobs
            .get(id)
            .map(|e| e.value().count.load(Ordering::SeqCst))
    }

    /// Stop all jobs.
    ///
    /// Pending ticks are cancelled; an action that is already running is
    /// awaited. No tick starts once this has been called.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        info!("Shutting down scheduler");
        self.inner.shutdown.cancel();

        let drivers = std::mem::take(&mut *self.inner.drivers.lock());
        for driver in drivers {
            if let Err(e) = driver.await {
                if e.is_panic() {
                    warn!("Job driver panicked: {}", e);
                }
            }
        }

        self.inner.jobs.clear();
        info!("Scheduler stopped");
    }

    fn spawn_driver(&self, job: Arc<JobEntry>) {
        if job.driven.swap(true, Ordering::SeqCst) {
            return;
        }

        // Checked under the lock so shutdown cannot miss a new handle
        let mut drivers = self.inner.drivers.lock();
        if self.inner.shutdown.is_cancelled() {
            debug!("Scheduler shut down; not driving job '{}'", job.id);
            return;
        }

        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.drive(job).await });

        drivers.retain(|h| !h.is_finished());
        drivers.push(handle);
    }

    async fn drive(self, job: Arc<JobEntry>) {
        let Some(mut deadline) = Instant::now().checked_add(job.cadence.next_delay(Utc::now()))
        else {
            error!("Job '{}' has an unschedulable cadence ({})", job.id, job.cadence);
            return;
        };

        loop {
            tokio::select! {
                _ = job.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            match self.fire_entry(&job).await {
                FireOutcome::Ran { .. } => {}
                FireOutcome::Capped { .. } | FireOutcome::Skipped => break,
            }

            let next = match job.cadence {
                Cadence::Interval(period) => {
                    // Fixed rate; if the action overran, wait a full period
                    let now = Instant::now();
                    match deadline.checked_add(period) {
                        Some(next) if next > now => Some(next),
                        _ => now.checked_add(period),
                    }
                }
                // Measured from just past the point we fired at
                _ => {
                    let delay = job.cadence.next_delay(Utc::now() + chrono::Duration::seconds(1));
                    Instant::now().checked_add(delay + Duration::from_secs(1))
                }
            };

            match next {
                Some(next) => deadline = next,
                None => {
                    error!("Job '{}' has an unschedulable cadence ({})", job.id, job.cadence);
                    break;
                }
            }
        }

        debug!("Driver for job '{}' stopped", job.id);
    }

    async fn fire_entry(&self, job: &Arc<JobEntry>) -> FireOutcome {
        let _guard = job.fire_lock.lock().await;

        if job.retired.load(Ordering::SeqCst) || job.cancel.is_cancelled() {
            return FireOutcome::Skipped;
        }

        let count = job.count.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = JobContext {
            count,
            limit: job.limit,
        };

        debug!("Firing job '{}' ({})", job.id, count);

        if AssertUnwindSafe((job.action)(ctx))
            .catch_unwind()
            .await
            .is_err()
        {
            error!("Job '{}' panicked on execution {}", job.id, count);
        }

        if ctx.is_final() {
            job.retired.store(true, Ordering::SeqCst);
            self.inner
                .jobs
                .remove_if(&job.id, |_, current| Arc::ptr_eq(current, job));
            job.cancel.cancel();
            info!(
                "Job '{}' reached its maximum of {} executions and was removed",
                job.id, count
            );
            return FireOutcome::Capped { count };
        }

        FireOutcome::Ran { count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_action(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(JobContext) -> BoxFuture<'static, ()> + Send + Sync + 'static {
        let counter = counter.clone();
        move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    fn hourly() -> Cadence {
        Cadence::every(Duration::from_secs(3600)).unwrap()
    }

    #[tokio::test]
    async fn test_ping_fires_twice_then_disappears() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        runner
            .register(
                "ping",
                Cadence::every(Duration::from_secs(1)).unwrap(),
                Some(2),
                counting_action(&calls),
            )
            .unwrap();

        assert_eq!(runner.fire("ping").await, FireOutcome::Ran { count: 1 });
        assert_eq!(runner.fire("ping").await, FireOutcome::Capped { count: 2 });
        assert_eq!(runner.fire("ping").await, FireOutcome::Skipped);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!runner.is_active("ping"));
        assert!(runner.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_job_keeps_running() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        runner.register("poll", hourly(), None, counting_action(&calls)).unwrap();

        for expected in 1..=5 {
            assert_eq!(runner.fire("poll").await, FireOutcome::Ran { count: expected });
        }
        assert_eq!(runner.execution_count("poll"), Some(5));
        assert!(runner.is_active("poll"));
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        runner.register("job", hourly(), None, counting_action(&calls)).unwrap();

        let err = runner
            .register("job", hourly(), Some(1), counting_action(&calls))
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateJob(ref id) if id == "job"));
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(runner.register("never", hourly(), Some(0), counting_action(&calls)).is_err());
    }

    #[tokio::test]
    async fn test_unschedulable_interval_rejected() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        runner.start();

        let huge = Cadence::Interval(Duration::from_secs(u64::MAX));
        let err = runner
            .register("forever", huge, None, counting_action(&calls))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!runner.is_active("forever"));
        assert!(runner.inner.drivers.lock().is_empty());

        runner.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_driver_spawned_after_shutdown() {
        let runner = JobRunner::new();
        runner.start();
        runner.shutdown().await;

        // a registration that raced past the shutdown check
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action(&calls);
        let entry = Arc::new(JobEntry::new(
            "late",
            hourly(),
            None,
            Arc::new(action),
            runner.inner.shutdown.child_token(),
        ));
        runner.spawn_driver(entry);

        assert!(runner.inner.drivers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(!runner.remove("ghost"));

        runner.register("job", hourly(), None, counting_action(&calls)).unwrap();
        assert!(runner.remove("job"));
        assert!(!runner.remove("job"));
        assert_eq!(runner.fire("job").await, FireOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fires_never_exceed_limit() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        runner
            .register("capped", hourly(), Some(3), move |_ctx| {
                let counter = counter.clone();
                async move {
                    tokio::task::yield_now().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let fires = (0..16).map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.fire("capped").await })
        });
        let outcomes: Vec<FireOutcome> = futures_util::future::join_all(fires)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, FireOutcome::Capped { .. })).count(),
            1
        );
        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, FireOutcome::Ran { .. })).count(),
            2
        );
        assert!(!runner.is_active("capped"));
    }

    #[tokio::test]
    async fn test_context_reports_progress() {
        let runner = JobRunner::new();
        let seen: Arc<Mutex<Vec<JobContext>>> = Arc::default();
        let sink = seen.clone();
        runner
            .register("ctx", hourly(), Some(2), move |ctx| {
                sink.lock().push(ctx);
                async {}
            })
            .unwrap();

        runner.fire("ctx").await;
        runner.fire("ctx").await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].is_final());
        assert!(seen[1].is_final());
        assert_eq!(seen[1].limit, Some(2));
    }

    #[tokio::test]
    async fn test_panicking_action_still_counts() {
        let runner = JobRunner::new();
        runner
            .register("boom", hourly(), Some(1), |_ctx| async {
                panic!("job failure");
            })
            .unwrap();

        assert_eq!(runner.fire("boom").await, FireOutcome::Capped { count: 1 });
        assert!(!runner.is_active("boom"));
    }

    #[tokio::test]
    async fn test_driver_fires_on_interval_until_capped() {
        let runner = JobRunner::new();
        let calls = Arc::new(AtomicUsize::new(0));
        runner.start();
        runner
            .register(
                "fast",
                Cadence::every(Duration::from_millis(20)).unwrap(),
                Some(3),
                counting_action(&calls),
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runner.is_active("fast") && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!runner.is_active("fast"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        runner.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_running_action_finish() {
        let runner = JobRunner::new();
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (started.clone(), finished.clone());

        let period = Cadence::every(Duration::from_millis(10)).unwrap();
        runner
            .register("slow", period, None, move |_ctx| {
                let (s, f) = (s.clone(), f.clone());
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        runner.start();
        assert!(runner.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while started.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        runner.shutdown().await;

        let after_shutdown = started.load(Ordering::SeqCst);
        assert!(after_shutdown >= 1);
        assert_eq!(finished.load(Ordering::SeqCst), after_shutdown);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(started.load(Ordering::SeqCst), after_shutdown);
        assert!(!runner.is_running());
        assert!(runner.active_jobs().is_empty());
        assert_eq!(runner.fire("slow").await, FireOutcome::Skipped);

        let calls = Arc::new(AtomicUsize::new(0));
        assert!(runner.register("late", hourly(), None, counting_action(&calls)).is_err());

        // a second shutdown is harmless
        runner.shutdown().await;
    }
}
