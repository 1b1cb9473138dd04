//! Background task that copies history appends into the SQLite store.

use tokio::sync::mpsc;

use crate::job::Job;

use super::db::HistoryDb;

/// Sender side for the runner plus the task handle to flush on shutdown.
pub struct PersistHandle {
    pub tx: mpsc::UnboundedSender<Job>,
    pub task: tokio::task::JoinHandle<u64>,
}

/// Spawns the persistence loop: receive terminal jobs, write each to `db`.
/// Failures are logged and skipped; the loop ends when every sender is dropped
/// and returns the number of records written.
pub fn spawn_persister(db: HistoryDb) -> PersistHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    let task = tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(job) = rx.recv().await {
            match db.record(&job).await {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(job_id = %job.id, "history persist failed: {:#}", e),
            }
        }
        written
    });
    PersistHandle { tx, task }
}
