//! Integration test: local HTTP server, real worker slots, persisted history.
//!
//! Submits a success, a 404, and a stalled request with a short budget, drains
//! the runner, then reopens the history database and checks that every record
//! survived and job ids continue from the stored maximum.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dlq_core::{
    ErrorKind, History, HistoryDb, HistoryFilter, JobId, JobStatus, Runner, RunnerConfig, Target,
};
use tempfile::tempdir;

fn target(base: &str, path: &str) -> Target {
    Target::new(&format!("{base}{path}")).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outcomes_are_recorded_and_survive_reopen() {
    let base = common::http_server::start();
    let state_dir = tempdir().unwrap();
    let db_path = state_dir.path().join("history.db");
    let db = HistoryDb::open_at(&db_path).await.unwrap();

    let history = Arc::new(History::new());
    let runner = Runner::start_persisted(
        RunnerConfig::default(),
        Arc::clone(&history),
        common::http_get_work(),
        db.clone(),
    )
    .unwrap();

    let ok = runner.submit(target(&base, "/video.mp4")).unwrap();
    let missing = runner.submit(target(&base, "/missing")).unwrap();
    let slow = runner
        .submit(target(&base, "/slow").budget_secs(0.5))
        .unwrap();

    let begin = Instant::now();
    let slow_rec = runner.wait(slow).await.unwrap();
    assert!(
        begin.elapsed() < common::http_server::SLOW_DELAY,
        "timed-out job should not wait for the server: {:?}",
        begin.elapsed()
    );
    assert_eq!(slow_rec.status, JobStatus::TimedOut);
    assert_eq!(slow_rec.error.as_ref().unwrap().kind, ErrorKind::Timeout);

    assert_eq!(runner.status(ok).unwrap().status, JobStatus::Succeeded);
    let missing_rec = runner.status(missing).unwrap();
    assert_eq!(missing_rec.status, JobStatus::Failed);
    assert_eq!(missing_rec.error.unwrap().message, "HTTP 404");

    let report = runner.drain(Duration::from_secs(5)).await;
    assert_eq!(report.cancelled_queued, 0);
    assert_eq!(report.persisted, 3);
    drop(runner);
    drop(db);

    let reopened = HistoryDb::open_at(&db_path).await.unwrap();
    let stored = reopened.list(&HistoryFilter::all()).await.unwrap();
    assert_eq!(stored, history.list(&HistoryFilter::all()));
    let failed = reopened
        .list(&HistoryFilter::all().status(JobStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.iter().map(|j| j.id).collect::<Vec<_>>(), vec![missing]);

    let max = reopened.max_job_id().await.unwrap().unwrap();
    assert_eq!(max, JobId(3));
    let next = Runner::start(
        RunnerConfig {
            first_id: max.0 + 1,
            ..RunnerConfig::default()
        },
        Arc::new(History::new()),
        common::http_get_work(),
    )
    .unwrap();
    assert_eq!(next.submit(target(&base, "/again")).unwrap(), JobId(4));
    next.drain(Duration::from_secs(5)).await;
}
