//! Job data model: identity, target, status, lifecycle transitions.

mod state;
mod types;

pub use state::is_legal_transition;
pub use types::{Job, JobId, JobOptions, JobStatus, Target};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix milliseconds (job timestamps).
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_rejects_garbage() {
        assert!(Target::new("").is_err());
        assert!(Target::new("not a url").is_err());
        assert!(Target::new("https://example.com/video").is_ok());
    }

    #[test]
    fn target_description_prefers_label() {
        let t = Target::new("https://example.com/v").unwrap();
        assert_eq!(t.description(), "https://example.com/v");
        let t = t.label("talk");
        assert_eq!(t.description(), "talk (https://example.com/v)");
    }

    #[test]
    fn job_id_parses_with_or_without_hash() {
        assert_eq!("7".parse::<JobId>().unwrap(), JobId(7));
        assert_eq!("#12".parse::<JobId>().unwrap(), JobId(12));
        assert!("unknown-id".parse::<JobId>().is_err());
    }

    #[test]
    fn status_strings() {
        for s in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
            JobStatus::TimedOut,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobStatus::parse("paused"), None);
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
