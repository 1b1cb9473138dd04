//! Timeout supervisor: bounds one job's wall-clock execution.
//!
//! Two modes, chosen by capability rather than by platform name:
//! - preemptive: the work runs as its own task under a per-invocation tokio
//!   timer; when the timer fires the task is aborted at its next await point
//!   and the outcome is `TimedOut`.
//! - unenforced: used when preemption is unavailable or the work runs on an
//!   OS thread. The work runs to completion, the outcome is flagged
//!   `enforced: false`, and `TimedOut` is never reported.
//!
//! Timers are per invocation, so concurrent worker slots never share one.

mod guard;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{JobError, WorkError};
use crate::work::AbortToken;

use self::guard::{flatten_join, ArmedTimer, TimerCounters, WorkTask};

/// Whether the environment can interrupt running work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preemption {
    #[default]
    Available,
    Unavailable,
}

/// Result of one supervised invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The work returned (or panicked, reported as `Err`) before the deadline.
    /// `enforced` is false when no deadline was armed.
    Completed {
        result: Result<(), WorkError>,
        enforced: bool,
    },
    /// The budget elapsed and the work was preempted.
    TimedOut { budget: Duration },
}

/// Snapshot of the supervisor's timer bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    /// Deadlines currently armed.
    pub armed: usize,
    /// Deadlines disarmed since construction.
    pub disarmed: u64,
}

/// Reject zero budgets; a `Duration` cannot be negative.
pub fn validate_budget(budget: Duration) -> Result<Duration, JobError> {
    if budget.is_zero() {
        return Err(JobError::InvalidConfiguration(
            "budget must be greater than zero".into(),
        ));
    }
    Ok(budget)
}

/// Convert a budget given in seconds, rejecting zero, negative, NaN, and infinite values.
pub fn budget_from_secs(secs: f64) -> Result<Duration, JobError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(JobError::InvalidConfiguration(format!(
            "budget must be a positive number of seconds (got {secs})"
        )));
    }
    let budget = Duration::try_from_secs_f64(secs)
        .map_err(|e| JobError::InvalidConfiguration(format!("budget {secs}s: {e}")))?;
    validate_budget(budget)
}

#[derive(Debug, Clone, Default)]
pub struct TimeoutSupervisor {
    preemption: Preemption,
    counters: Arc<TimerCounters>,
}

impl TimeoutSupervisor {
    pub fn new(preemption: Preemption) -> Self {
        Self {
            preemption,
            counters: Arc::new(TimerCounters::default()),
        }
    }

    /// Capability flag: true if budgets can be enforced for preemptible work.
    pub fn enforces_deadlines(&self) -> bool {
        self.preemption == Preemption::Available
    }

    pub fn timer_stats(&self) -> TimerStats {
        TimerStats {
            armed: self.counters.armed.load(Ordering::Acquire),
            disarmed: self.counters.disarmed.load(Ordering::Acquire),
        }
    }

    /// Run `work` under `budget`.
    ///
    /// `preemptible` is the work's own declaration (see `Work::preemptible`);
    /// the deadline is enforced only if both it and the supervisor allow it.
    /// On timeout `abort` is raised before the task is aborted.
    /// Returns `InvalidConfiguration` without polling `work` if the budget is zero.
    pub async fn run<F>(
        &self,
        budget: Duration,
        abort: &AbortToken,
        preemptible: bool,
        work: F,
    ) -> Result<Outcome, JobError>
    where
        F: std::future::Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        let budget = validate_budget(budget)?;
        if self.enforces_deadlines() && preemptible {
            Ok(self.run_preemptive(budget, abort, work).await)
        } else {
            Ok(self.run_unenforced(budget, preemptible, work).await)
        }
    }

    async fn run_preemptive<F>(&self, budget: Duration, abort: &AbortToken, work: F) -> Outcome
    where
        F: std::future::Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        let _timer = ArmedTimer::arm(&self.counters);
        let mut task = WorkTask::spawn(work);
        match tokio::time::timeout(budget, &mut task.handle).await {
            Ok(joined) => Outcome::Completed {
                result: flatten_join(joined),
                enforced: true,
            },
            Err(_elapsed) => {
                abort.abort();
                tracing::warn!(
                    budget_ms = budget.as_millis() as u64,
                    "work preempted after budget elapsed"
                );
                Outcome::TimedOut { budget }
            }
        }
    }

    async fn run_unenforced<F>(&self, budget: Duration, preemptible: bool, work: F) -> Outcome
    where
        F: std::future::Future<Output = Result<(), WorkError>> + Send + 'static,
    {
        tracing::warn!(
            budget_ms = budget.as_millis() as u64,
            preemptible,
            supervisor_preemption = ?self.preemption,
            "deadline not enforced for this run"
        );
        let started = tokio::time::Instant::now();
        let mut task = WorkTask::spawn(work);
        let result = flatten_join((&mut task.handle).await);
        let elapsed = started.elapsed();
        if elapsed > budget {
            tracing::warn!(
                budget_ms = budget.as_millis() as u64,
                elapsed_ms = elapsed.as_millis() as u64,
                "work overran its budget with no enforcement"
            );
        }
        Outcome::Completed {
            result,
            enforced: false,
        }
    }
}
