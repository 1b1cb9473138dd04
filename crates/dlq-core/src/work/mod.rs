//! The unit of work a job executes (the download itself).
//!
//! The runner knows nothing about transfer protocols: it hands each job's
//! `Target` to a `Work` implementation and gets back `Ok(())` or a `WorkError`.

mod command;

pub use command::CommandWork;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::WorkError;
use crate::job::{JobId, Target};

/// Boxed future returned by `Work::run`.
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send + 'static>>;

/// Shared flag raised when the job's budget elapses or drain force-cancels it.
///
/// Preemptible work is dropped at its next await point anyway; blocking work
/// checks this between chunks and returns early.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-execution context handed to the work alongside the target.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub job_id: JobId,
    pub budget: Duration,
    pub abort: AbortToken,
}

impl WorkContext {
    pub fn new(job_id: JobId, budget: Duration) -> Self {
        Self {
            job_id,
            budget,
            abort: AbortToken::new(),
        }
    }
}

/// Capability the runner consumes: run one job's target to completion.
pub trait Work: Send + Sync + 'static {
    fn run(&self, target: Target, ctx: WorkContext) -> WorkFuture;

    /// Whether dropping the future stops the work. False for work that runs on
    /// an OS thread; the supervisor then cannot enforce a deadline.
    fn preemptible(&self) -> bool {
        true
    }
}

impl<W: Work + ?Sized> Work for Arc<W> {
    fn run(&self, target: Target, ctx: WorkContext) -> WorkFuture {
        (**self).run(target, ctx)
    }

    fn preemptible(&self) -> bool {
        (**self).preemptible()
    }
}

/// Async closure adapter. See `from_fn`.
pub struct FnWork<F>(F);

/// Wrap an async closure `Fn(Target, WorkContext) -> impl Future<Output = Result<(), WorkError>>`.
pub fn from_fn<F, Fut>(f: F) -> FnWork<F>
where
    F: Fn(Target, WorkContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    FnWork(f)
}

impl<F, Fut> Work for FnWork<F>
where
    F: Fn(Target, WorkContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    fn run(&self, target: Target, ctx: WorkContext) -> WorkFuture {
        Box::pin((self.0)(target, ctx))
    }
}

/// Synchronous closure adapter: runs on the blocking pool, not preemptible.
pub struct BlockingWork<F>(Arc<F>);

/// Wrap a blocking closure. It should poll `ctx.abort` if it wants to stop early on drain.
pub fn blocking<F>(f: F) -> BlockingWork<F>
where
    F: Fn(&Target, &WorkContext) -> Result<(), WorkError> + Send + Sync + 'static,
{
    BlockingWork(Arc::new(f))
}

impl<F> Work for BlockingWork<F>
where
    F: Fn(&Target, &WorkContext) -> Result<(), WorkError> + Send + Sync + 'static,
{
    fn run(&self, target: Target, ctx: WorkContext) -> WorkFuture {
        let f = Arc::clone(&self.0);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || f(&target, &ctx))
                .await
                .map_err(|e| WorkError::msg(format!("blocking work join: {e}")))?
        })
    }

    fn preemptible(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> WorkContext {
        WorkContext::new(JobId(1), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn fn_work_runs_closure() {
        let work = from_fn(|target: Target, _ctx| async move {
            if target.url.ends_with("/bad") {
                return Err(WorkError::msg("404"));
            }
            Ok(())
        });
        assert!(work.preemptible());
        let ok = Target::new("https://example.com/good").unwrap();
        let bad = Target::new("https://example.com/bad").unwrap();
        assert!(work.run(ok, ctx()).await.is_ok());
        assert_eq!(work.run(bad, ctx()).await.unwrap_err().to_string(), "404");
    }

    #[tokio::test]
    async fn blocking_work_is_not_preemptible_and_sees_abort() {
        let work = blocking(|_t: &Target, ctx: &WorkContext| {
            if ctx.abort.is_aborted() {
                return Err(WorkError::msg("aborted"));
            }
            Ok(())
        });
        assert!(!work.preemptible());
        let t = Target::new("https://example.com/x").unwrap();
        assert!(work.run(t.clone(), ctx()).await.is_ok());
        let c = ctx();
        c.abort.abort();
        assert!(work.run(t, c).await.is_err());
    }

    #[tokio::test]
    async fn blocking_work_panic_becomes_error() {
        let work = blocking(|_t: &Target, _c: &WorkContext| -> Result<(), WorkError> {
            panic!("segment writer exploded")
        });
        let t = Target::new("https://example.com/x").unwrap();
        let err = work.run(t, ctx()).await.unwrap_err();
        assert!(err.to_string().contains("blocking work join"));
    }
}
