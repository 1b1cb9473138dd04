//! Types describing a job: identity, target, status, and the job record itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{JobError, JobFailure};

/// Job identifier. Allocated in submission order by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse::<u64>().map(JobId)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the stored string form. Returns None for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            "timed_out" | "timedout" => Some(JobStatus::TimedOut),
            "cancelled" | "canceled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// True for statuses no further transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }

    /// Whether a job in this status may carry an error.
    pub fn carries_error(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::TimedOut)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job options. Opaque to the runner except for `budget_secs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Wall-clock budget in seconds; the runner default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_secs: Option<f64>,
    /// Free-form display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Options forwarded untouched to the work function (format, output dir, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// What to fetch. The runner checks that `url` parses and never looks further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    #[serde(default)]
    pub options: JobOptions,
}

impl Target {
    /// Build a target from a URL, rejecting strings that do not parse as an absolute URL.
    pub fn new(url: &str) -> Result<Self, JobError> {
        Self::with_options(url, JobOptions::default())
    }

    pub fn with_options(url: &str, options: JobOptions) -> Result<Self, JobError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(JobError::InvalidConfiguration("empty target URL".into()));
        }
        url::Url::parse(url).map_err(|e| {
            JobError::InvalidConfiguration(format!("invalid target URL {url:?}: {e}"))
        })?;
        Ok(Self {
            url: url.to_string(),
            options,
        })
    }

    /// Set the per-job budget in seconds. Validated at submission.
    pub fn budget_secs(mut self, secs: f64) -> Self {
        self.options.budget_secs = Some(secs);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.options.label = Some(label.into());
        self
    }

    /// Human-readable description, used for logs and persisted records.
    pub fn description(&self) -> String {
        match &self.options.label {
            Some(label) => format!("{} ({})", label, self.url),
            None => self.url.clone(),
        }
    }
}

/// A job and its execution state. Snapshots of this are what `status` and history return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub target: Target,
    pub status: JobStatus,
    /// Effective wall-clock budget for this job.
    pub budget: Duration,
    /// Unix milliseconds.
    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    /// Whether the budget was enforced for the execution. None if the job never ran.
    pub deadline_enforced: Option<bool>,
    /// Set only for `Failed` and `TimedOut`.
    pub error: Option<JobFailure>,
}

impl Job {
    /// Wall-clock execution time, once both timestamps are stamped.
    pub fn run_duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        Some(Duration::from_millis(finished.saturating_sub(started).max(0) as u64))
    }
}
