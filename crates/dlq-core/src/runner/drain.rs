//! Graceful shutdown: stop intake, cancel queued jobs, let in-flight jobs finish.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::job::unix_millis;

use super::Runner;

/// What `drain` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queued jobs cancelled before they started.
    pub cancelled_queued: usize,
    /// In-flight jobs that reached a terminal state on their own.
    pub completed_in_flight: usize,
    /// In-flight jobs cancelled because the drain timeout elapsed.
    pub force_cancelled: usize,
    /// Records written to the history database (0 when not persisted).
    pub persisted: u64,
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            if e.is_panic() {
                tracing::error!("worker slot panicked: {}", e);
            }
        }
    }
}

impl Runner {
    /// Stop accepting submissions, cancel every queued job, and wait up to
    /// `timeout` for running jobs. Jobs still running after that are cancelled
    /// and recorded as `Cancelled`. Every submitted job has exactly one history
    /// record when this returns. Calling it again is a no-op.
    ///
    /// Dropping the returned future early leaves the slots in place, so a
    /// later `drain` or dropping the runner still records every job.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let mut workers_guard = self.workers.lock().await;
        let Some(workers) = workers_guard.as_mut() else {
            return DrainReport::default();
        };

        let (cancelled_queued, in_flight) = {
            let mut q = self.shared.lock_queue();
            let cancelled = q.close(unix_millis());
            for job in &cancelled {
                tracing::debug!(job_id = %job.id, "queued job cancelled by drain");
            }
            let count = cancelled.len();
            for job in cancelled {
                self.shared.record(job);
            }
            (count, q.running())
        };
        // Idle slots see the closed queue and exit.
        self.shared.job_available.notify_waiters();
        self.shared.job_finished.notify_waiters();
        tracing::info!(cancelled_queued, in_flight, "draining runner");

        if tokio::time::timeout(timeout, join_all(workers))
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "drain timeout elapsed; cancelling in-flight jobs"
            );
            self.shared.force_cancel.send_replace(true);
            join_all(workers).await;
        }
        // Every slot has exited; later drains return immediately.
        workers_guard.take();

        let swept = {
            let mut q = self.shared.lock_queue();
            let left = q.sweep(unix_millis());
            let n = left.len();
            for job in left {
                self.shared.record(job);
            }
            n
        };
        if swept > 0 {
            tracing::warn!(swept, "jobs left behind by worker slots were cancelled");
        }
        self.shared.job_finished.notify_waiters();

        let force_cancelled = self.shared.force_cancelled.load(Ordering::Acquire) + swept;

        // Dropping the sender ends the persistence loop once it has flushed.
        self.shared
            .persist_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let persisted = match self.persist_task.lock().await.take() {
            Some(task) => match task.await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("history persistence task failed: {}", e);
                    0
                }
            },
            None => 0,
        };

        let report = DrainReport {
            cancelled_queued,
            completed_in_flight: in_flight.saturating_sub(force_cancelled),
            force_cancelled,
            persisted,
        };
        tracing::info!(?report, "runner drained");
        report
    }
}
