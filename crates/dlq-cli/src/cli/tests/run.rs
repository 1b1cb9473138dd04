//! Tests for the run subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_run_minimal() {
    match parse(&[
        "dlq",
        "run",
        "https://example.com/a.iso",
        "--",
        "curl",
    ]) {
        CliCommand::Run {
            jobs,
            budget,
            drain_timeout,
            command,
            urls,
        } => {
            assert!(jobs.is_none());
            assert!(budget.is_none());
            assert!(drain_timeout.is_none());
            assert_eq!(command, vec!["curl"]);
            assert_eq!(urls, vec!["https://example.com/a.iso"]);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_flags_and_hyphenated_args() {
    match parse(&[
        "dlq",
        "run",
        "--jobs",
        "3",
        "--budget",
        "12.5",
        "--drain-timeout",
        "5",
        "https://example.com/a",
        "https://example.com/b",
        "--",
        "curl",
        "-sSfL",
        "-o",
        "/tmp/out",
        "{url}",
    ]) {
        CliCommand::Run {
            jobs,
            budget,
            drain_timeout,
            command,
            urls,
        } => {
            assert_eq!(jobs, Some(3));
            assert_eq!(budget, Some(12.5));
            assert_eq!(drain_timeout, Some(5.0));
            assert_eq!(command, vec!["curl", "-sSfL", "-o", "/tmp/out", "{url}"]);
            assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
        }
        _ => panic!("expected Run with flags"),
    }
}

#[test]
fn cli_parse_run_requires_command_and_urls() {
    assert!(Cli::try_parse_from(["dlq", "run", "https://example.com/a"]).is_err());
    assert!(Cli::try_parse_from(["dlq", "run", "--", "curl"]).is_err());
}

#[test]
fn cli_parse_run_rejects_non_numeric_jobs() {
    assert!(Cli::try_parse_from([
        "dlq",
        "run",
        "--jobs",
        "many",
        "https://example.com/a",
        "--",
        "curl",
    ])
    .is_err());
}
