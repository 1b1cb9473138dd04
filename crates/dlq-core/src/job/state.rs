//! Status transitions. The only place a job's status, timestamps, or error change.

use std::time::Duration;

use crate::error::{JobError, JobFailure};

use super::types::{Job, JobId, JobStatus, Target};

/// Returns true if `from -> to` is a legal step of the job lifecycle.
pub fn is_legal_transition(from: JobStatus, to: JobStatus) -> bool {
    match (from, to) {
        (JobStatus::Queued, JobStatus::Running) | (JobStatus::Queued, JobStatus::Cancelled) => true,
        (JobStatus::Running, next) => next.is_terminal(),
        _ => false,
    }
}

impl Job {
    /// New job in `Queued`, stamped with the submission time.
    pub(crate) fn queued(id: JobId, target: Target, budget: Duration, now: i64) -> Self {
        Self {
            id,
            target,
            status: JobStatus::Queued,
            budget,
            submitted_at: now,
            started_at: None,
            finished_at: None,
            deadline_enforced: None,
            error: None,
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), JobError> {
        if !is_legal_transition(self.status, to) {
            return Err(JobError::IllegalTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Queued -> Running`; stamps `started_at`.
    pub(crate) fn start(&mut self, now: i64) -> Result<(), JobError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// `Queued -> Cancelled` (cancel before dequeue, or drain).
    pub(crate) fn cancel_queued(&mut self, now: i64) -> Result<(), JobError> {
        if self.status != JobStatus::Queued {
            return Err(JobError::IllegalTransition {
                id: self.id,
                from: self.status,
                to: JobStatus::Cancelled,
            });
        }
        self.transition(JobStatus::Cancelled)?;
        self.finished_at = Some(now);
        Ok(())
    }

    /// `Running -> terminal`; stamps `finished_at` and keeps the error only
    /// for statuses that carry one.
    pub(crate) fn finish(
        &mut self,
        to: JobStatus,
        error: Option<JobFailure>,
        deadline_enforced: bool,
        now: i64,
    ) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return Err(JobError::IllegalTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.transition(to)?;
        self.finished_at = Some(now.max(self.started_at.unwrap_or(now)));
        self.deadline_enforced = Some(deadline_enforced);
        self.error = if to.carries_error() { error } else { None };
        Ok(())
    }
}
