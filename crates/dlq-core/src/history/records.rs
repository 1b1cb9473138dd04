//! History record write and read operations.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::time::Duration;

use crate::error::{ErrorKind, JobFailure};
use crate::job::{Job, JobId, JobOptions, JobStatus, Target};

use super::db::HistoryDb;
use super::HistoryFilter;

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let job_id: i64 = row.get("job_id");
    let url: String = row.get("url");
    let options_json: Option<String> = row.get("options_json");
    let status_str: String = row.get("status");
    let budget_ms: i64 = row.get("budget_ms");
    let submitted_at: i64 = row.get("submitted_at");
    let started_at: Option<i64> = row.get("started_at");
    let finished_at: Option<i64> = row.get("finished_at");
    let deadline_enforced: Option<bool> = row.get("deadline_enforced");
    let error_kind: Option<String> = row.get("error_kind");
    let error_message: Option<String> = row.get("error_message");

    let options = options_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<JobOptions>)
        .transpose()
        .with_context(|| format!("parse options of job {job_id}"))?
        .unwrap_or_default();
    let status = JobStatus::parse(&status_str)
        .with_context(|| format!("unknown status {status_str:?} for job {job_id}"))?;
    let error = match (error_kind, error_message) {
        (Some(kind), message) => Some(JobFailure::new(
            ErrorKind::from_str(&kind),
            message.unwrap_or_default(),
        )),
        (None, _) => None,
    };

    Ok(Job {
        id: JobId(job_id as u64),
        target: Target { url, options },
        status,
        budget: Duration::from_millis(budget_ms.max(0) as u64),
        submitted_at,
        started_at,
        finished_at,
        deadline_enforced,
        error,
    })
}

impl HistoryDb {
    /// Persist one terminal job. A second record for the same job id is ignored.
    pub async fn record(&self, job: &Job) -> Result<()> {
        let options_json = serde_json::to_string(&job.target.options)?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO job_history (
                job_id, url, description, options_json, status, budget_ms,
                submitted_at, started_at, finished_at, deadline_enforced,
                error_kind, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(job.id.0 as i64)
        .bind(&job.target.url)
        .bind(job.target.description())
        .bind(options_json)
        .bind(job.status.as_str())
        .bind(job.budget.as_millis() as i64)
        .bind(job.submitted_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.deadline_enforced)
        .bind(job.error.as_ref().map(|e| e.kind.as_str()))
        .bind(job.error.as_ref().map(|e| e.message.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records matching `filter`, in the order they were appended.
    pub async fn list(&self, filter: &HistoryFilter) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT
                job_id, url, options_json, status, budget_ms,
                submitted_at, started_at, finished_at, deadline_enforced,
                error_kind, error_message
            FROM job_history
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR finished_at >= ?2)
              AND (?3 IS NULL OR finished_at <= ?3)
            ORDER BY seq ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.since)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    /// Fetch the record for one job id.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT
                job_id, url, options_json, status, budget_ms,
                submitted_at, started_at, finished_at, deadline_enforced,
                error_kind, error_message
            FROM job_history
            WHERE job_id = ?1
            "#,
        )
        .bind(id.0 as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Highest recorded job id, used to seed the id counter of a new runner.
    pub async fn max_job_id(&self) -> Result<Option<JobId>> {
        let row = sqlx::query(r#"SELECT MAX(job_id) AS max_id FROM job_history"#)
            .fetch_one(&self.pool)
            .await?;
        let max_id: Option<i64> = row.get("max_id");
        Ok(max_id.map(|id| JobId(id as u64)))
    }
}
