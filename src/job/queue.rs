//! Job Queue: polls the job store for `waiting` jobs and drives them through
//! `runner::run_job` under a configured concurrency bound, mirroring the
//! teacher's `crawl_engine::CrawlQueue` poll-and-dispatch loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::model::{Job, JobId, JobStatus};

use super::progress::CreditLedger;
use super::runner::{CancellationFlag, JobRunnerContext};
use super::store::JobStore;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const CREDITS_PER_RECORD: u64 = 1;

/// Default job-queue concurrency per §5 (1-3 concurrently running jobs),
/// chosen at the low end since each job already fans out its own
/// `scraper_concurrency` detail workers against the one shared browser pool.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 2;

/// Registry of cancellation flags for currently-running jobs, so a
/// user-initiated delete (observed out-of-band, e.g. by the HTTP layer
/// writing a cancellation intent) can be translated into a flag flip the
/// runner will observe at its next suspension point.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    flags: Mutex<HashMap<JobId, CancellationFlag>>,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn register(&self, job_id: JobId, flag: CancellationFlag) {
        self.flags.lock().await.insert(job_id, flag);
    }

    async fn unregister(&self, job_id: JobId) {
        self.flags.lock().await.remove(&job_id);
    }

    /// Called by whatever surfaces a user's delete intent (out of scope
    /// here; exposed so that caller can wire it up).
    pub async fn cancel(&self, job_id: JobId) -> bool {
        if let Some(flag) = self.flags.lock().await.get(&job_id) {
            flag.cancel();
            true
        } else {
            false
        }
    }
}

/// Drives the poll loop. Runs until `shutdown` resolves.
pub async fn run_queue(
    store: Arc<JobStore>,
    runner_ctx: Arc<QueueRunnerContext>,
    concurrency: usize,
    cancellations: Arc<CancellationRegistry>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("job queue shutting down");
                return;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let waiting = match store.list_waiting(concurrency.max(1) as i64).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("failed to poll job store for waiting jobs: {}", e);
                continue;
            }
        };

        for job in waiting {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                continue;
            };

            let store = Arc::clone(&store);
            let runner_ctx = Arc::clone(&runner_ctx);
            let cancellations = Arc::clone(&cancellations);

            tokio::spawn(async move {
                let _permit = permit;
                run_one_job(job, store, runner_ctx, cancellations).await;
            });
        }
    }
}

/// Resources shared by every job the queue dispatches, minus the
/// per-job `CancellationFlag` (created fresh per job and registered so
/// `CancellationRegistry::cancel` can reach it).
pub struct QueueRunnerContext {
    pub pool: Arc<crate::browser_pool::BrowserPool>,
    pub config: crate::config::SharedConfig,
    pub resolver: Arc<crate::verify::DnsResolver>,
    pub progress_sink: Arc<dyn super::progress::ProgressSink>,
    pub credit_ledger: Arc<dyn CreditLedger>,
}

async fn run_one_job(
    mut job: Job,
    store: Arc<JobStore>,
    runner_ctx: Arc<QueueRunnerContext>,
    cancellations: Arc<CancellationRegistry>,
) {
    let required_credits = job.params.max_records as u64 * CREDITS_PER_RECORD;
    match runner_ctx.credit_ledger.check_credits(&job.user_id, required_credits).await {
        Ok(true) => {}
        Ok(false) => {
            job.status = JobStatus::Failed;
            job.error = Some(crate::model::JobError {
                message: "insufficient credits".to_string(),
                timestamp: chrono::Utc::now(),
            });
            let _ = store.save(&job).await;
            return;
        }
        Err(e) => {
            warn!(job_id = %job.id, "credit check failed, running job anyway: {}", e);
        }
    }

    let cancellation = CancellationFlag::new();
    cancellations.register(job.id, cancellation.clone()).await;

    let ctx = JobRunnerContext {
        pool: Arc::clone(&runner_ctx.pool),
        config: Arc::clone(&runner_ctx.config),
        resolver: Arc::clone(&runner_ctx.resolver),
        progress_sink: Arc::clone(&runner_ctx.progress_sink),
        cancellation,
    };

    let result = super::runner::run_job(&mut job, &ctx).await;
    cancellations.unregister(job.id).await;

    // `run_job` already sets `Cancelled` (plus `error`/`completed_at`) itself when
    // cancellation wins the race; only a non-cancellation failure should land here.
    if let Err(e) = result {
        if job.status != JobStatus::Cancelled {
            job.status = JobStatus::Failed;
            job.error = Some(crate::model::JobError {
                message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    if job.status == JobStatus::Completed {
        if let Err(e) = runner_ctx.credit_ledger.deduct_credits(&job.user_id, required_credits).await {
            warn!(job_id = %job.id, "credit deduction failed after successful job: {}", e);
        }
    }

    if let Err(e) = store.save(&job).await {
        error!(job_id = %job.id, "failed to persist completed job: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_unknown_job_returns_false() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel(uuid::Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn registered_job_can_be_cancelled() {
        let registry = CancellationRegistry::new();
        let job_id = uuid::Uuid::new_v4();
        let flag = CancellationFlag::new();
        registry.register(job_id, flag.clone()).await;

        assert!(registry.cancel(job_id).await);
        assert!(flag.is_cancelled());
    }
}
