//! CLI for the DLQ download job runner.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlq_core::config;
use dlq_core::HistoryDb;

use commands::{run_history, run_jobs, HistoryArgs, RunArgs};

/// Top-level CLI for the DLQ download job runner.
#[derive(Debug, Parser)]
#[command(name = "dlq")]
#[command(about = "DLQ: run download jobs under per-job time budgets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one job per URL through an external downloader, then drain and print a summary.
    ///
    /// Example: dlq run --budget 60 https://example.com/a.iso -- curl -sSfLO
    Run {
        /// Worker slots (jobs at once). Overrides `workers` from config.
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Per-job budget in seconds. Overrides `default_budget_secs` from config.
        #[arg(long, value_name = "SECS")]
        budget: Option<f64>,
        /// Seconds to wait for running jobs on shutdown before cancelling them.
        #[arg(long, value_name = "SECS")]
        drain_timeout: Option<f64>,
        /// Target URLs.
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
        /// Downloader program and its arguments, after `--`; `{url}` is replaced by the target URL.
        #[arg(last = true, required = true, value_name = "PROG")]
        command: Vec<String>,
    },

    /// List persisted job history.
    History {
        /// Only records with this status: queued, running, succeeded, failed,
        /// timed_out or cancelled.
        #[arg(long)]
        status: Option<String>,
        /// Only records finished at or after this Unix time in milliseconds.
        #[arg(long, value_name = "MS")]
        since: Option<i64>,
        /// Only records finished at or before this Unix time in milliseconds.
        #[arg(long, value_name = "MS")]
        until: Option<i64>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = match &cfg.history_db {
            Some(path) => HistoryDb::open_at(path).await?,
            None => HistoryDb::open_default().await?,
        };

        match cli.command {
            CliCommand::Run {
                jobs,
                budget,
                drain_timeout,
                command,
                urls,
            } => {
                let args = RunArgs {
                    jobs,
                    budget,
                    drain_timeout,
                    command,
                    urls,
                };
                run_jobs(&db, &cfg, args).await?;
            }
            CliCommand::History {
                status,
                since,
                until,
            } => {
                run_history(
                    &db,
                    HistoryArgs {
                        status,
                        since,
                        until,
                    },
                )
                .await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
