//! RAII guards for one supervised invocation: the armed deadline and the work task.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::WorkError;

/// Arm/disarm counters shared by clones of one supervisor.
#[derive(Debug, Default)]
pub(super) struct TimerCounters {
    pub(super) armed: AtomicUsize,
    pub(super) disarmed: AtomicU64,
}

/// Marks a deadline as armed for as long as it lives; disarms exactly once on drop,
/// whichever way the invocation exits (completion, error, timeout, caller drop).
pub(super) struct ArmedTimer<'a> {
    counters: &'a TimerCounters,
}

impl<'a> ArmedTimer<'a> {
    pub(super) fn arm(counters: &'a TimerCounters) -> Self {
        counters.armed.fetch_add(1, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for ArmedTimer<'_> {
    fn drop(&mut self) {
        self.counters.armed.fetch_sub(1, Ordering::AcqRel);
        self.counters.disarmed.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owns the spawned work task; aborts it when dropped unless it already finished.
pub(super) struct WorkTask {
    pub(super) handle: tokio::task::JoinHandle<Result<(), WorkError>>,
}

impl WorkTask {
    pub(super) fn spawn<F>(work: F) -> Self
    where
        F: std::future::Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(work),
        }
    }
}

impl Drop for WorkTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Flatten a joined work task: a panic or abort becomes a `WorkError`.
pub(super) fn flatten_join(
    joined: Result<Result<(), WorkError>, tokio::task::JoinError>,
) -> Result<(), WorkError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(WorkError::msg(format!(
            "work panicked: {}",
            panic_message(e)
        ))),
        Err(e) => Err(WorkError::msg(format!("work task cancelled: {e}"))),
    }
}

fn panic_message(e: tokio::task::JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
