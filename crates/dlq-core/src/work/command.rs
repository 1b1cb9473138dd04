//! Work that runs an external downloader program per job.
//!
//! `{url}` in the argument list is replaced by the target URL (appended when
//! absent). The child is killed when the work is preempted.

use anyhow::Context;
use std::process::Stdio;

use crate::error::WorkError;
use crate::job::Target;

use super::{Work, WorkContext, WorkFuture};

const URL_PLACEHOLDER: &str = "{url}";
/// Lines of stderr kept for the failure message.
const STDERR_TAIL_LINES: usize = 3;

#[derive(Debug, Clone)]
pub struct CommandWork {
    program: String,
    args: Vec<String>,
}

impl CommandWork {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments for one target, with the URL substituted.
    pub fn args_for(&self, target: &Target) -> Vec<String> {
        let mut substituted = false;
        let mut out: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.contains(URL_PLACEHOLDER) {
                    substituted = true;
                    a.replace(URL_PLACEHOLDER, &target.url)
                } else {
                    a.clone()
                }
            })
            .collect();
        if !substituted {
            out.push(target.url.clone());
        }
        out
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

impl Work for CommandWork {
    fn run(&self, target: Target, ctx: WorkContext) -> WorkFuture {
        let program = self.program.clone();
        let args = self.args_for(&target);
        Box::pin(async move {
            let mut cmd = tokio::process::Command::new(&program);
            cmd.args(&args)
                .env("DLQ_JOB_ID", ctx.job_id.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            for (key, value) in &target.options.extra {
                cmd.env(format!("DLQ_OPT_{}", key.to_ascii_uppercase()), value);
            }
            tracing::debug!(job_id = %ctx.job_id, %program, ?args, "spawning downloader");

            let output = cmd
                .output()
                .await
                .with_context(|| format!("spawn {program}"))?;
            if output.status.success() {
                return Ok(());
            }
            let tail = stderr_tail(&output.stderr);
            let err = match output.status.code() {
                Some(code) => anyhow::anyhow!("{program} exited with status {code}: {tail}"),
                None => anyhow::anyhow!("{program} terminated by signal: {tail}"),
            };
            Err(WorkError::from(err))
        })
    }
}
