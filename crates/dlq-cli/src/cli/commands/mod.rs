//! CLI command handlers. Each command is in its own file.

mod history;
mod run;

pub use history::{run_history, HistoryArgs};
pub use run::{run_jobs, RunArgs};

use dlq_core::Job;

/// Print jobs as a table: id, status, enforcement, run time, target, error.
pub(crate) fn print_jobs(jobs: &[Job]) {
    println!(
        "{:<6} {:<10} {:<9} {:<9} {}",
        "ID", "STATUS", "ENFORCED", "SECS", "TARGET"
    );
    for j in jobs {
        let enforced = match j.deadline_enforced {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        let secs = j
            .run_duration()
            .map(|d| format!("{:.2}", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<10} {:<9} {:<9} {}",
            j.id.0,
            j.status.as_str(),
            enforced,
            secs,
            j.target.description()
        );
        if let Some(err) = &j.error {
            println!("       {}", err);
        }
    }
}
