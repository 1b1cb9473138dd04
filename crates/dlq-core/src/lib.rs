pub mod config;
pub mod error;
pub mod history;
pub mod job;
pub mod logging;
pub mod runner;
pub mod supervisor;
pub mod work;

pub use error::{ErrorKind, JobError, JobFailure, WorkError};
pub use history::{History, HistoryDb, HistoryFilter};
pub use job::{Job, JobId, JobOptions, JobStatus, Target};
pub use runner::{DrainReport, Runner, RunnerConfig, RunnerStats};
pub use supervisor::{Outcome, Preemption, TimeoutSupervisor};
pub use work::{Work, WorkContext};
