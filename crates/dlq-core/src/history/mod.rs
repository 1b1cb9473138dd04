//! Append-only ledger of terminal job outcomes.
//!
//! `History` is the in-process ledger the runner appends to (completion
//! order). `HistoryDb` is the optional SQLite copy that survives restarts;
//! the runner feeds it through a background persistence task.

mod db;
mod persist;
mod records;

pub use db::HistoryDb;
pub use persist::{spawn_persister, PersistHandle};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::JobError;
use crate::job::{Job, JobId, JobStatus};

/// Query over history records. All fields optional; time bounds are inclusive
/// and apply to `finished_at` (Unix milliseconds).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub status: Option<JobStatus>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl HistoryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, millis: i64) -> Self {
        self.since = Some(millis);
        self
    }

    pub fn until(mut self, millis: i64) -> Self {
        self.until = Some(millis);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        if self.status.is_some_and(|s| s != job.status) {
            return false;
        }
        let finished = job.finished_at.unwrap_or(i64::MIN);
        if self.since.is_some_and(|since| finished < since) {
            return false;
        }
        if self.until.is_some_and(|until| finished > until) {
            return false;
        }
        true
    }
}

#[derive(Debug, Default)]
struct Ledger {
    records: Vec<Job>,
    by_id: HashMap<JobId, usize>,
}

/// In-process history. Constructed once and shared with the runner by `Arc`.
#[derive(Debug, Default)]
pub struct History {
    ledger: Mutex<Ledger>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a terminal job. Rejects non-terminal snapshots and a second record for the same id.
    pub fn append(&self, job: Job) -> Result<(), JobError> {
        if !job.status.is_terminal() {
            return Err(JobError::InvalidConfiguration(format!(
                "job {} is {} and cannot be recorded",
                job.id, job.status
            )));
        }
        let mut ledger = self.ledger();
        if ledger.by_id.contains_key(&job.id) {
            return Err(JobError::DuplicateRecord(job.id));
        }
        let idx = ledger.records.len();
        ledger.by_id.insert(job.id, idx);
        ledger.records.push(job);
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        let ledger = self.ledger();
        ledger.by_id.get(&id).map(|&i| ledger.records[i].clone())
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.ledger().by_id.contains_key(&id)
    }

    /// Matching records in insertion (completion) order.
    pub fn list(&self, filter: &HistoryFilter) -> Vec<Job> {
        self.ledger()
            .records
            .iter()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ledger().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
