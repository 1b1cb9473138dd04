//! Error taxonomy shared by the queue, supervisor, and history.
//!
//! `JobError` is what callers of `submit`/`cancel`/`status`/`drain` see.
//! `WorkError` is what a unit of work returns; it is recorded on the job,
//! never propagated out of the runner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::{JobId, JobStatus};

/// Classification of a core error. Stored alongside the message on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad budget, bad target, or bad runner settings. Rejected synchronously.
    InvalidConfiguration,
    /// The external work returned an error (or panicked).
    WorkFailure,
    /// The supervisor preempted the work after its budget elapsed.
    Timeout,
    /// Unknown job id.
    NotFound,
    /// Bounded-capacity queue is at its limit.
    QueueFull,
    /// Submission after drain started.
    ShuttingDown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::WorkFailure => "work_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::ShuttingDown => "shutting_down",
        }
    }

    /// Parse the stored string form; unknown strings map to `WorkFailure`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "invalid_configuration" => ErrorKind::InvalidConfiguration,
            "timeout" => ErrorKind::Timeout,
            "not_found" => ErrorKind::NotFound,
            "queue_full" => ErrorKind::QueueFull,
            "shutting_down" => ErrorKind::ShuttingDown,
            _ => ErrorKind::WorkFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced to the caller of a runner or supervisor operation.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("queue is full ({capacity} queued jobs)")]
    QueueFull { capacity: usize },
    #[error("runner is draining; new submissions are rejected")]
    ShuttingDown,
    #[error("illegal status transition for job {id}: {from} -> {to}")]
    IllegalTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("job {0} is already recorded in history")]
    DuplicateRecord(JobId),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            JobError::NotFound(_) => ErrorKind::NotFound,
            JobError::QueueFull { .. } => ErrorKind::QueueFull,
            JobError::ShuttingDown => ErrorKind::ShuttingDown,
            // Internal invariant breaches.
            JobError::IllegalTransition { .. } | JobError::DuplicateRecord(_) => {
                ErrorKind::InvalidConfiguration
            }
        }
    }
}

/// Error returned by a unit of work (the download itself).
///
/// Wraps `anyhow::Error` so work implementations can use `?` and `.context(..)`.
#[derive(Debug, thiserror::Error)]
#[error("{0:#}")]
pub struct WorkError(#[from] anyhow::Error);

impl WorkError {
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        WorkError(anyhow::Error::msg(message))
    }
}

/// Error details recorded on a `Failed` or `TimedOut` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_error_kinds() {
        assert_eq!(
            JobError::InvalidConfiguration("x".into()).kind(),
            ErrorKind::InvalidConfiguration
        );
        assert_eq!(JobError::NotFound(JobId(3)).kind(), ErrorKind::NotFound);
        assert_eq!(
            JobError::QueueFull { capacity: 2 }.kind(),
            ErrorKind::QueueFull
        );
        assert_eq!(JobError::ShuttingDown.kind(), ErrorKind::ShuttingDown);
    }

    #[test]
    fn error_kind_string_roundtrip() {
        for kind in [
            ErrorKind::InvalidConfiguration,
            ErrorKind::WorkFailure,
            ErrorKind::Timeout,
            ErrorKind::NotFound,
            ErrorKind::QueueFull,
            ErrorKind::ShuttingDown,
        ] {
            assert_eq!(ErrorKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn work_error_keeps_context_chain() {
        let err: WorkError = anyhow::anyhow!("connection reset")
            .context("fetch segment 3")
            .into();
        assert_eq!(err.to_string(), "fetch segment 3: connection reset");
    }
}
