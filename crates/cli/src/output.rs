// SPDX-License-Identifier: MIT

//! Text/JSON rendering for run records (§6 Run Record wire form).

use aro_core::RunRecord;
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Format a millisecond epoch timestamp as relative time ("5s", "2m", "1h", "3d").
pub fn format_time_ago(epoch_ms: Option<u64>) -> String {
    let Some(epoch_ms) = epoch_ms else {
        return "-".to_string();
    };
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let elapsed_secs = now_ms.saturating_sub(epoch_ms) / 1000;
    if elapsed_secs < 60 {
        format!("{elapsed_secs}s")
    } else if elapsed_secs < 3600 {
        format!("{}m", elapsed_secs / 60)
    } else if elapsed_secs < 86400 {
        format!("{}h", elapsed_secs / 3600)
    } else {
        format!("{}d", elapsed_secs / 86400)
    }
}

pub fn print_run(record: &RunRecord, log: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "record": record,
                "log": log,
            });
            println!("{}", serde_json::to_string_pretty(&obj).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("run        {}", record.run_id);
            println!("project    {}", record.project_id);
            println!("sprint     {}", record.sprint_id);
            println!("status     {}", record.status);
            if let Some(reason) = record.reason {
                println!("reason     {reason}");
            }
            println!("iteration  {}/{}", record.current_iteration, record.max_iterations);
            println!("branch     {}", record.sandbox_branch);
            println!("progress   {}", format_time_ago(record.last_progress_at_ms));
            if !record.errors.is_empty() {
                println!("errors:");
                for err in &record.errors {
                    println!("  - {err}");
                }
            }
            if !log.is_empty() {
                println!("--- log tail ---");
                for line in log {
                    println!("{line}");
                }
            }
        }
    }
}

pub fn print_run_list(records: &[RunRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("{:<14} {:<10} {:<10} {:<10} {:<8}", "RUN", "STATUS", "REASON", "ITER", "AGE");
            for record in records {
                let reason = record.reason.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<14} {:<10} {:<10} {:<10} {:<8}",
                    record.run_id,
                    record.status,
                    reason,
                    format!("{}/{}", record.current_iteration, record.max_iterations),
                    format_time_ago(Some(record.created_at_ms)),
                );
            }
        }
    }
}
