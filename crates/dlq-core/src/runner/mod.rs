//! Job queue and runner.
//!
//! `N` worker slots pull from one FIFO queue. Each job runs through the
//! timeout supervisor; its terminal snapshot is appended to `History` (and
//! forwarded to the persistence task, if any) before the slot takes the next
//! job. With `workers = 1` jobs run strictly one at a time in submission order.
//!
//! Lock order: queue, then history, then the persistence sender.

mod drain;
mod queue;
mod worker;

pub use drain::DrainReport;

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::JobError;
use crate::history::{History, HistoryDb, PersistHandle};
use crate::job::{unix_millis, Job, JobId, Target};
use crate::supervisor::{budget_from_secs, validate_budget, Preemption, TimeoutSupervisor};
use crate::work::Work;

use self::queue::{Cancel, QueueState};

/// Runner settings. See `DlqConfig::runner_config` for the on-disk form.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Worker slots; 1 = strict sequential FIFO.
    pub workers: usize,
    /// Budget for jobs that do not set one.
    pub default_budget: Duration,
    /// Maximum queued jobs; None = unbounded.
    pub queue_capacity: Option<usize>,
    pub preemption: Preemption,
    /// First job id to allocate (seed from persisted history to keep ids unique).
    pub first_id: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            default_budget: Duration::from_secs(300),
            queue_capacity: None,
            preemption: Preemption::Available,
            first_id: 1,
        }
    }
}

impl RunnerConfig {
    fn validate(&self) -> Result<(), JobError> {
        if self.workers == 0 {
            return Err(JobError::InvalidConfiguration(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(JobError::InvalidConfiguration(
                "queue_capacity must be at least 1 when set".into(),
            ));
        }
        validate_budget(self.default_budget)?;
        Ok(())
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStats {
    pub queued: usize,
    pub running: usize,
    pub recorded: usize,
    pub accepting: bool,
}

/// State shared between the runner handle and its worker slots.
pub(crate) struct Shared {
    queue: Mutex<QueueState>,
    history: Arc<History>,
    supervisor: TimeoutSupervisor,
    work: Arc<dyn Work>,
    /// Wakes a slot waiting for a job (submit), or all of them (drain).
    job_available: Notify,
    /// Wakes `wait` callers whenever a record is appended.
    job_finished: Notify,
    /// Set to true when drain gives up waiting for in-flight jobs.
    force_cancel: watch::Sender<bool>,
    force_cancelled: AtomicUsize,
    persist_tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a terminal job to history and the persistence channel. Call with the queue lock held.
    fn record(&self, job: Job) {
        let persisted = job.clone();
        if let Err(e) = self.history.append(job) {
            tracing::error!(job_id = %persisted.id, "history append rejected: {}", e);
            return;
        }
        let tx = self.persist_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = tx.as_ref() {
            if tx.send(persisted).is_err() {
                tracing::warn!("history persistence task is gone; record kept in memory only");
            }
        }
    }

    /// Move a finished job from the live set into history.
    fn complete(&self, job: Job) {
        {
            let mut q = self.lock_queue();
            if q.complete(job.id) {
                self.record(job);
            } else {
                tracing::debug!(job_id = %job.id, "job already recorded by shutdown sweep");
            }
        }
        self.job_finished.notify_waiters();
    }
}

/// Handle to a running set of worker slots. Create inside a tokio runtime.
pub struct Runner {
    shared: Arc<Shared>,
    default_budget: Duration,
    workers: tokio::sync::Mutex<Option<JoinSet<()>>>,
    persist_task: tokio::sync::Mutex<Option<JoinHandle<u64>>>,
}

impl Runner {
    /// Start `config.workers` slots executing `work`, recording into `history`.
    pub fn start<W: Work>(
        config: RunnerConfig,
        history: Arc<History>,
        work: W,
    ) -> Result<Self, JobError> {
        Self::spawn(config, history, Arc::new(work), None)
    }

    /// Like `start`, and also copies every history record into `db`.
    pub fn start_persisted<W: Work>(
        config: RunnerConfig,
        history: Arc<History>,
        work: W,
        db: HistoryDb,
    ) -> Result<Self, JobError> {
        let persist = crate::history::spawn_persister(db);
        Self::spawn(config, history, Arc::new(work), Some(persist))
    }

    fn spawn(
        config: RunnerConfig,
        history: Arc<History>,
        work: Arc<dyn Work>,
        persist: Option<PersistHandle>,
    ) -> Result<Self, JobError> {
        config.validate()?;
        let (persist_tx, persist_task) = match persist {
            Some(PersistHandle { tx, task }) => (Some(tx), Some(task)),
            None => (None, None),
        };
        let (force_cancel, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::new(config.first_id, config.queue_capacity)),
            history,
            supervisor: TimeoutSupervisor::new(config.preemption),
            work,
            job_available: Notify::new(),
            job_finished: Notify::new(),
            force_cancel,
            force_cancelled: AtomicUsize::new(0),
            persist_tx: Mutex::new(persist_tx),
        });

        let mut workers = JoinSet::new();
        for slot in 0..config.workers {
            workers.spawn(worker::worker_loop(Arc::clone(&shared), slot));
        }
        tracing::info!(
            workers = config.workers,
            enforces_deadlines = shared.supervisor.enforces_deadlines(),
            "runner started"
        );

        Ok(Self {
            shared,
            default_budget: config.default_budget,
            workers: tokio::sync::Mutex::new(Some(workers)),
            persist_task: tokio::sync::Mutex::new(persist_task),
        })
    }

    /// Queue a job and return its id immediately.
    ///
    /// Fails with `InvalidConfiguration` for a bad per-job budget, `QueueFull`
    /// when a bounded queue is at capacity, `ShuttingDown` after drain began.
    pub fn submit(&self, target: Target) -> Result<JobId, JobError> {
        let budget = match target.options.budget_secs {
            Some(secs) => budget_from_secs(secs)?,
            None => self.default_budget,
        };
        let description = target.description();
        let id = self.shared.lock_queue().enqueue(target, budget, unix_millis())?;
        tracing::debug!(job_id = %id, target = %description, "job queued");
        self.shared.job_available.notify_one();
        Ok(id)
    }

    /// Cancel a job that has not started. Returns false if it is running or already terminal.
    pub fn cancel(&self, id: JobId) -> Result<bool, JobError> {
        let cancelled = {
            let mut q = self.shared.lock_queue();
            match q.cancel_queued(id, unix_millis()) {
                Cancel::Cancelled(job) => {
                    self.shared.record(job);
                    true
                }
                Cancel::NotQueued => false,
                Cancel::Unknown if self.shared.history.contains(id) => false,
                Cancel::Unknown => return Err(JobError::NotFound(id)),
            }
        };
        if cancelled {
            tracing::debug!(job_id = %id, "job cancelled before start");
            self.shared.job_finished.notify_waiters();
        }
        Ok(cancelled)
    }

    /// Current snapshot of a job, live or recorded.
    pub fn status(&self, id: JobId) -> Result<Job, JobError> {
        let q = self.shared.lock_queue();
        if let Some(job) = q.get(id) {
            return Ok(job.clone());
        }
        self.shared.history.get(id).ok_or(JobError::NotFound(id))
    }

    /// Wait until the job is terminal and return its history record.
    pub async fn wait(&self, id: JobId) -> Result<Job, JobError> {
        loop {
            let notified = self.shared.job_finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let known = {
                let q = self.shared.lock_queue();
                if let Some(job) = self.shared.history.get(id) {
                    return Ok(job);
                }
                q.get(id).is_some()
            };
            if !known {
                return Err(JobError::NotFound(id));
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> RunnerStats {
        let q = self.shared.lock_queue();
        RunnerStats {
            queued: q.queued(),
            running: q.running(),
            recorded: self.shared.history.len(),
            accepting: q.is_accepting(),
        }
    }

    pub fn history(&self) -> &Arc<History> {
        &self.shared.history
    }

    /// The runner's supervisor; `enforces_deadlines()` is the capability flag callers should check.
    pub fn supervisor(&self) -> &TimeoutSupervisor {
        &self.shared.supervisor
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            tracing::warn!("runner dropped without a completed drain; cancelling remaining jobs");
            // JoinSet aborts its tasks on drop.
            drop(workers);
        }
        // Runs even when no slots are left: a cancelled drain may have left live jobs behind.
        let mut q = self.shared.lock_queue();
        let left = q.sweep(unix_millis());
        let swept = left.len();
        for job in left {
            self.shared.record(job);
        }
        drop(q);
        if swept > 0 {
            self.shared.job_finished.notify_waiters();
        }
    }
}
