//! `dlq run` – run one job per URL, drain, and print what happened.

use anyhow::{bail, Context, Result};
use dlq_core::config::DlqConfig;
use dlq_core::work::CommandWork;
use dlq_core::{History, HistoryDb, JobId, JobStatus, Runner, Target};
use std::sync::Arc;

use super::print_jobs;

/// Flags of `dlq run`; `None` keeps the config value.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub jobs: Option<usize>,
    pub budget: Option<f64>,
    pub drain_timeout: Option<f64>,
    pub command: Vec<String>,
    pub urls: Vec<String>,
}

/// Config with command-line overrides applied.
fn effective_config(cfg: &DlqConfig, args: &RunArgs) -> DlqConfig {
    let mut cfg = cfg.clone();
    if let Some(jobs) = args.jobs {
        cfg.workers = jobs;
    }
    if let Some(budget) = args.budget {
        cfg.default_budget_secs = budget;
    }
    if let Some(drain) = args.drain_timeout {
        cfg.drain_timeout_secs = drain;
    }
    cfg
}

pub async fn run_jobs(db: &HistoryDb, cfg: &DlqConfig, args: RunArgs) -> Result<()> {
    let cfg = effective_config(cfg, &args);
    let mut runner_cfg = cfg.runner_config()?;
    runner_cfg.first_id = match db.max_job_id().await? {
        Some(JobId(max)) => max + 1,
        None => 1,
    };

    let (program, prog_args) = args
        .command
        .split_first()
        .context("missing downloader program after `--`")?;
    let work = CommandWork::new(program.clone(), prog_args.to_vec());

    let history = Arc::new(History::new());
    let runner = Runner::start_persisted(runner_cfg, Arc::clone(&history), work, db.clone())?;
    if !runner.supervisor().enforces_deadlines() {
        eprintln!("warning: preemptive timeouts are disabled; budgets will not be enforced");
    }

    let mut ids = Vec::with_capacity(args.urls.len());
    let mut rejected = 0usize;
    for url in &args.urls {
        let submitted = Target::new(url).and_then(|target| runner.submit(target));
        match submitted {
            Ok(id) => ids.push(id),
            Err(e) => {
                rejected += 1;
                eprintln!("skipping {url}: {e}");
                tracing::warn!(%url, "job rejected: {}", e);
            }
        }
    }

    let mut finished = Vec::with_capacity(ids.len());
    for id in ids {
        finished.push(runner.wait(id).await?);
    }
    let report = runner.drain(cfg.drain_timeout()).await;
    tracing::info!(?report, "run finished");

    if finished.is_empty() {
        println!("No jobs run.");
    } else {
        print_jobs(&finished);
    }
    let not_ok = finished
        .iter()
        .filter(|j| j.status != JobStatus::Succeeded)
        .count();
    check_outcome(rejected, not_ok, finished.len())
}

/// Fails the command when any URL was rejected or any job did not succeed.
fn check_outcome(rejected: usize, not_ok: usize, ran: usize) -> Result<()> {
    match (rejected, not_ok) {
        (0, 0) => Ok(()),
        (0, n) => bail!("{} of {} job(s) did not succeed", n, ran),
        (r, 0) => bail!("{} URL(s) rejected at submission", r),
        (r, n) => bail!(
            "{} URL(s) rejected at submission; {} of {} job(s) did not succeed",
            r,
            n,
            ran
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cfg = DlqConfig::default();
        let args = RunArgs {
            jobs: Some(4),
            budget: Some(2.5),
            drain_timeout: None,
            command: vec!["curl".into()],
            urls: vec![],
        };
        let eff = effective_config(&cfg, &args);
        assert_eq!(eff.workers, 4);
        assert!((eff.default_budget_secs - 2.5).abs() < 1e-9);
        assert!((eff.drain_timeout_secs - cfg.drain_timeout_secs).abs() < 1e-9);
    }

    #[test]
    fn rejected_urls_fail_the_run() {
        assert!(check_outcome(0, 0, 3).is_ok());
        let err = check_outcome(1, 0, 2).unwrap_err().to_string();
        assert_eq!(err, "1 URL(s) rejected at submission");
        // Every URL invalid: nothing ran, still an error.
        assert!(check_outcome(2, 0, 0).is_err());
        let err = check_outcome(1, 1, 3).unwrap_err().to_string();
        assert!(err.contains("1 of 3 job(s) did not succeed"), "{err}");
        let err = check_outcome(0, 2, 2).unwrap_err().to_string();
        assert_eq!(err, "2 of 2 job(s) did not succeed");
    }
}
