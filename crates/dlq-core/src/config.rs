use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::JobError;
use crate::runner::RunnerConfig;
use crate::supervisor::{budget_from_secs, Preemption};

/// Global configuration loaded from `~/.config/dlq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Number of worker slots (jobs executing at once). 1 = strict FIFO, one job at a time.
    pub workers: usize,
    /// Budget in seconds for jobs that do not set their own.
    pub default_budget_secs: f64,
    /// Maximum number of queued jobs (None = unbounded). Submissions beyond it fail with QueueFull.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Preempt work whose budget elapsed. When false, budgets are reported as not enforced.
    #[serde(default = "default_preemptive")]
    pub preemptive_timeouts: bool,
    /// How long drain waits for in-flight jobs before force-cancelling them.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: f64,
    /// Optional history database path (None = `~/.local/state/dlq/history.db`).
    #[serde(default)]
    pub history_db: Option<PathBuf>,
}

fn default_preemptive() -> bool {
    true
}

fn default_drain_timeout_secs() -> f64 {
    30.0
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            default_budget_secs: 300.0,
            queue_capacity: None,
            preemptive_timeouts: default_preemptive(),
            drain_timeout_secs: default_drain_timeout_secs(),
            history_db: None,
        }
    }
}

impl DlqConfig {
    /// Validate and convert into runner settings.
    pub fn runner_config(&self) -> Result<RunnerConfig, JobError> {
        if self.workers == 0 {
            return Err(JobError::InvalidConfiguration(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(JobError::InvalidConfiguration(
                "queue_capacity must be at least 1 when set".into(),
            ));
        }
        Ok(RunnerConfig {
            workers: self.workers,
            default_budget: budget_from_secs(self.default_budget_secs)?,
            queue_capacity: self.queue_capacity,
            preemption: if self.preemptive_timeouts {
                Preemption::Available
            } else {
                Preemption::Unavailable
            },
            first_id: 1,
        })
    }

    /// Drain timeout as a duration; non-positive values mean "do not wait".
    pub fn drain_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.drain_timeout_secs).unwrap_or(Duration::ZERO)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DlqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
