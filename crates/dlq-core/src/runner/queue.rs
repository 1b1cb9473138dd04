//! Queue state guarded by the runner's mutex: pending FIFO, live jobs, id counter.
//!
//! Everything here is synchronous; callers hold the lock for the whole call.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::JobError;
use crate::job::{Job, JobId, JobStatus, Target};

/// Result of asking the queue for the next job.
#[derive(Debug)]
pub(super) enum Dequeue {
    /// Snapshot of the job, already transitioned to `Running`.
    Job(Job),
    /// Nothing queued right now.
    Empty,
    /// Nothing queued and no more submissions accepted.
    Closed,
}

/// Result of `cancel_queued`.
#[derive(Debug)]
pub(super) enum Cancel {
    Cancelled(Job),
    NotQueued,
    Unknown,
}

#[derive(Debug)]
pub(super) struct QueueState {
    /// Ids of `Queued` jobs in submission order.
    pending: VecDeque<JobId>,
    /// Jobs not yet terminal (`Queued` or `Running`).
    live: HashMap<JobId, Job>,
    running: usize,
    next_id: u64,
    capacity: Option<usize>,
    accepting: bool,
}

impl QueueState {
    pub(super) fn new(first_id: u64, capacity: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            live: HashMap::new(),
            running: 0,
            next_id: first_id.max(1),
            capacity,
            accepting: true,
        }
    }

    pub(super) fn queued(&self) -> usize {
        self.pending.len()
    }

    pub(super) fn running(&self) -> usize {
        self.running
    }

    pub(super) fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub(super) fn get(&self, id: JobId) -> Option<&Job> {
        self.live.get(&id)
    }

    /// Allocate an id and queue a new job. Never blocks.
    pub(super) fn enqueue(
        &mut self,
        target: Target,
        budget: Duration,
        now: i64,
    ) -> Result<JobId, JobError> {
        if !self.accepting {
            return Err(JobError::ShuttingDown);
        }
        if let Some(capacity) = self.capacity {
            if self.pending.len() >= capacity {
                return Err(JobError::QueueFull { capacity });
            }
        }
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, Job::queued(id, target, budget, now));
        self.pending.push_back(id);
        Ok(id)
    }

    /// Pop the oldest queued job and mark it `Running`.
    pub(super) fn dequeue(&mut self, now: i64) -> Dequeue {
        while let Some(id) = self.pending.pop_front() {
            let Some(job) = self.live.get_mut(&id) else {
                continue;
            };
            if let Err(e) = job.start(now) {
                tracing::error!(job_id = %id, "skipping job at dequeue: {}", e);
                continue;
            }
            self.running += 1;
            return Dequeue::Job(job.clone());
        }
        if self.accepting {
            Dequeue::Empty
        } else {
            Dequeue::Closed
        }
    }

    /// Cancel a job that has not been dequeued yet; removes it from the queue and live set.
    pub(super) fn cancel_queued(&mut self, id: JobId, now: i64) -> Cancel {
        let Some(job) = self.live.get(&id) else {
            return Cancel::Unknown;
        };
        if job.status != JobStatus::Queued {
            return Cancel::NotQueued;
        }
        let Some(mut job) = self.live.remove(&id) else {
            return Cancel::Unknown;
        };
        if let Some(pos) = self.pending.iter().position(|p| *p == id) {
            self.pending.remove(pos);
        }
        match job.cancel_queued(now) {
            Ok(()) => Cancel::Cancelled(job),
            Err(e) => {
                tracing::error!(job_id = %id, "cancel of queued job failed: {}", e);
                self.live.insert(id, job);
                Cancel::NotQueued
            }
        }
    }

    /// Stop accepting submissions and cancel every queued job, oldest first.
    pub(super) fn close(&mut self, now: i64) -> Vec<Job> {
        self.accepting = false;
        let ids: Vec<JobId> = self.pending.iter().copied().collect();
        ids.into_iter()
            .filter_map(|id| match self.cancel_queued(id, now) {
                Cancel::Cancelled(job) => Some(job),
                Cancel::NotQueued | Cancel::Unknown => None,
            })
            .collect()
    }

    /// Remove a finished job from the live set. Returns false if it was already
    /// swept (and recorded) by shutdown, in which case the caller must not record it again.
    pub(super) fn complete(&mut self, id: JobId) -> bool {
        if self.live.remove(&id).is_none() {
            return false;
        }
        self.running = self.running.saturating_sub(1);
        true
    }

    /// Force every remaining live job to `Cancelled` (runner torn down without a clean drain).
    pub(super) fn sweep(&mut self, now: i64) -> Vec<Job> {
        self.accepting = false;
        self.pending.clear();
        self.running = 0;
        let mut left: Vec<Job> = self.live.drain().map(|(_, job)| job).collect();
        left.sort_by_key(|j| j.id);
        for job in &mut left {
            let res = match job.status {
                JobStatus::Queued => job.cancel_queued(now),
                _ => job.finish(JobStatus::Cancelled, None, false, now),
            };
            if let Err(e) = res {
                tracing::error!(job_id = %job.id, "sweep transition failed: {}", e);
            }
        }
        left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(n: u32) -> Target {
        Target::new(&format!("https://example.com/{n}")).unwrap()
    }

    const BUDGET: Duration = Duration::from_secs(5);

    #[test]
    fn fifo_dequeue_in_submission_order() {
        let mut q = QueueState::new(1, None);
        let ids: Vec<JobId> = (0..4).map(|n| q.enqueue(target(n), BUDGET, 0).unwrap()).collect();
        assert_eq!(ids, vec![JobId(1), JobId(2), JobId(3), JobId(4)]);
        for expected in ids {
            match q.dequeue(10) {
                Dequeue::Job(job) => {
                    assert_eq!(job.id, expected);
                    assert_eq!(job.status, JobStatus::Running);
                    assert_eq!(job.started_at, Some(10));
                }
                other => panic!("expected job, got {other:?}"),
            }
        }
        assert!(matches!(q.dequeue(10), Dequeue::Empty));
        assert_eq!(q.running(), 4);
    }

    #[test]
    fn cancelled_job_is_skipped() {
        let mut q = QueueState::new(1, None);
        let a = q.enqueue(target(1), BUDGET, 0).unwrap();
        let b = q.enqueue(target(2), BUDGET, 0).unwrap();
        match q.cancel_queued(a, 5) {
            Cancel::Cancelled(job) => {
                assert_eq!(job.status, JobStatus::Cancelled);
                assert_eq!(job.finished_at, Some(5));
            }
            other => panic!("expected cancel, got {other:?}"),
        }
        assert!(q.get(a).is_none());
        assert!(matches!(q.dequeue(6), Dequeue::Job(j) if j.id == b));
        assert!(matches!(q.cancel_queued(b, 7), Cancel::NotQueued));
        assert!(matches!(q.cancel_queued(JobId(99), 7), Cancel::Unknown));
    }

    #[test]
    fn bounded_capacity_rejects_without_blocking() {
        let mut q = QueueState::new(1, Some(2));
        q.enqueue(target(1), BUDGET, 0).unwrap();
        q.enqueue(target(2), BUDGET, 0).unwrap();
        let err = q.enqueue(target(3), BUDGET, 0).unwrap_err();
        assert!(matches!(err, JobError::QueueFull { capacity: 2 }));
        // Dequeue frees a slot: capacity counts queued jobs only.
        assert!(matches!(q.dequeue(1), Dequeue::Job(_)));
        assert!(q.enqueue(target(3), BUDGET, 0).is_ok());
    }

    #[test]
    fn close_cancels_queued_and_rejects_submissions() {
        let mut q = QueueState::new(10, None);
        let a = q.enqueue(target(1), BUDGET, 0).unwrap();
        assert_eq!(a, JobId(10));
        assert!(matches!(q.dequeue(1), Dequeue::Job(_)));
        q.enqueue(target(2), BUDGET, 0).unwrap();
        q.enqueue(target(3), BUDGET, 0).unwrap();

        let cancelled = q.close(2);
        assert_eq!(cancelled.iter().map(|j| j.id.0).collect::<Vec<_>>(), vec![11, 12]);
        assert!(cancelled.iter().all(|j| j.status == JobStatus::Cancelled));
        assert!(matches!(q.enqueue(target(4), BUDGET, 3), Err(JobError::ShuttingDown)));
        assert!(matches!(q.dequeue(3), Dequeue::Closed));
        assert_eq!(q.running(), 1);
        assert!(q.complete(a));
        assert_eq!(q.running(), 0);
        assert!(!q.complete(a));
    }

    #[test]
    fn sweep_terminates_everything_left() {
        let mut q = QueueState::new(1, None);
        let a = q.enqueue(target(1), BUDGET, 0).unwrap();
        q.enqueue(target(2), BUDGET, 0).unwrap();
        assert!(matches!(q.dequeue(1), Dequeue::Job(_)));
        let swept = q.sweep(9);
        assert_eq!(swept.len(), 2);
        assert!(swept.iter().all(|j| j.status == JobStatus::Cancelled));
        assert_eq!(swept[0].id, a);
        assert_eq!(swept[0].deadline_enforced, Some(false));
        assert!(!q.complete(a), "swept job must not be recorded twice");
    }
}
