//! Worker slot: wait for a job, run it under the supervisor, record the outcome.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{ErrorKind, JobFailure};
use crate::job::{unix_millis, Job, JobStatus};
use crate::supervisor::Outcome;
use crate::work::WorkContext;

use super::queue::Dequeue;
use super::Shared;

/// Runs until the queue is closed and empty.
pub(super) async fn worker_loop(shared: Arc<Shared>, slot: usize) {
    let mut force_rx = shared.force_cancel.subscribe();
    tracing::debug!(slot, "worker slot started");
    while let Some(job) = next_job(&shared).await {
        execute(&shared, slot, job, &mut force_rx).await;
    }
    tracing::debug!(slot, "worker slot stopped");
}

/// Blocks the slot until a job is available (`Some`) or shutdown closed the queue (`None`).
async fn next_job(shared: &Shared) -> Option<Job> {
    loop {
        let notified = shared.job_available.notified();
        tokio::pin!(notified);
        // Register before checking so a submit between check and await is not missed.
        notified.as_mut().enable();

        let next = shared.lock_queue().dequeue(unix_millis());
        match next {
            Dequeue::Job(job) => return Some(job),
            Dequeue::Closed => return None,
            Dequeue::Empty => {}
        }
        notified.await;
    }
}

/// Terminal status, error, and enforcement flag for a supervised run.
fn classify(
    outcome: Result<Outcome, crate::error::JobError>,
) -> (JobStatus, Option<JobFailure>, bool) {
    match outcome {
        Ok(Outcome::Completed {
            result: Ok(()),
            enforced,
        }) => (JobStatus::Succeeded, None, enforced),
        Ok(Outcome::Completed {
            result: Err(e),
            enforced,
        }) => (
            JobStatus::Failed,
            Some(JobFailure::new(ErrorKind::WorkFailure, e.to_string())),
            enforced,
        ),
        Ok(Outcome::TimedOut { budget }) => (
            JobStatus::TimedOut,
            Some(JobFailure::new(
                ErrorKind::Timeout,
                format!("exceeded budget of {:.3}s", budget.as_secs_f64()),
            )),
            true,
        ),
        Err(e) => (
            JobStatus::Failed,
            Some(JobFailure::new(e.kind(), e.to_string())),
            false,
        ),
    }
}

async fn execute(shared: &Shared, slot: usize, mut job: Job, force_rx: &mut watch::Receiver<bool>) {
    let ctx = WorkContext::new(job.id, job.budget);
    let abort = ctx.abort.clone();
    let preemptible = shared.work.preemptible();
    let work = shared.work.run(job.target.clone(), ctx);

    tracing::info!(
        job_id = %job.id,
        slot,
        target = %job.target.description(),
        budget_ms = job.budget.as_millis() as u64,
        "job started"
    );

    let supervised = shared.supervisor.run(job.budget, &abort, preemptible, work);
    let outcome = tokio::select! {
        outcome = supervised => Some(outcome),
        _ = force_rx.wait_for(|forced| *forced) => None,
    };

    let (status, error, enforced) = match outcome {
        Some(outcome) => classify(outcome),
        None => {
            // Drain timed out: the supervised future (and its work task) was dropped above.
            abort.abort();
            shared.force_cancelled.fetch_add(1, Ordering::AcqRel);
            (JobStatus::Cancelled, None, false)
        }
    };

    if let Err(e) = job.finish(status, error, enforced, unix_millis()) {
        tracing::error!(job_id = %job.id, "finish transition failed: {}", e);
    }

    match (&job.status, &job.error) {
        (JobStatus::Succeeded, _) => {
            tracing::info!(
                job_id = %job.id,
                slot,
                elapsed_ms = ?job.run_duration().map(|d| d.as_millis()),
                "job succeeded"
            )
        }
        (status, Some(err)) => {
            tracing::warn!(job_id = %job.id, slot, %status, "job finished: {}", err)
        }
        (status, None) => tracing::warn!(job_id = %job.id, slot, %status, "job finished"),
    }

    shared.complete(job);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JobError, WorkError};
    use std::time::Duration;

    #[test]
    fn classify_maps_outcomes() {
        let (s, e, enforced) = classify(Ok(Outcome::Completed {
            result: Ok(()),
            enforced: true,
        }));
        assert_eq!((s, e, enforced), (JobStatus::Succeeded, None, true));

        let (s, e, enforced) = classify(Ok(Outcome::Completed {
            result: Err(WorkError::msg("HTTP 404")),
            enforced: false,
        }));
        assert_eq!(s, JobStatus::Failed);
        assert_eq!(e, Some(JobFailure::new(ErrorKind::WorkFailure, "HTTP 404")));
        assert!(!enforced);

        let (s, e, _) = classify(Ok(Outcome::TimedOut {
            budget: Duration::from_secs(1),
        }));
        assert_eq!(s, JobStatus::TimedOut);
        let e = e.unwrap();
        assert_eq!(e.kind, ErrorKind::Timeout);
        assert_eq!(e.message, "exceeded budget of 1.000s");

        let (s, e, _) = classify(Err(JobError::InvalidConfiguration("zero budget".into())));
        assert_eq!(s, JobStatus::Failed);
        assert_eq!(e.unwrap().kind, ErrorKind::InvalidConfiguration);
    }
}
