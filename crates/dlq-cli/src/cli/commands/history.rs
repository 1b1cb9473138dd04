//! `dlq history` – list persisted job records.

use anyhow::{anyhow, Result};
use dlq_core::{HistoryDb, HistoryFilter, JobStatus};

use super::print_jobs;

#[derive(Debug, Clone, Default)]
pub struct HistoryArgs {
    pub status: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

fn filter_from(args: &HistoryArgs) -> Result<HistoryFilter> {
    let status = match args.status.as_deref() {
        Some(s) => Some(JobStatus::parse(s).ok_or_else(|| anyhow!("unknown status {s:?}"))?),
        None => None,
    };
    Ok(HistoryFilter {
        status,
        since: args.since,
        until: args.until,
    })
}

pub async fn run_history(db: &HistoryDb, args: HistoryArgs) -> Result<()> {
    let filter = filter_from(&args)?;
    let jobs = db.list(&filter).await?;
    if jobs.is_empty() {
        println!("No matching jobs in history.");
    } else {
        print_jobs(&jobs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_parse() {
        let args = HistoryArgs {
            status: Some("timed_out".into()),
            since: Some(10),
            until: None,
        };
        let f = filter_from(&args).unwrap();
        assert_eq!(f.status, Some(JobStatus::TimedOut));
        assert_eq!(f.since, Some(10));

        let bad = HistoryArgs {
            status: Some("paused".into()),
            ..Default::default()
        };
        assert!(filter_from(&bad).is_err());
    }
}
