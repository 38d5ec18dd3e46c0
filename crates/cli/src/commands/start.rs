// SPDX-License-Identifier: MIT

use crate::App;
use anyhow::Result;
use aro_core::RunId;
use clap::Args;

#[derive(Args)]
pub struct StartArgs {
    /// Project id the sprint belongs to
    pub project_id: String,
    /// Sprint id to work through
    pub sprint_id: String,
    /// Branch name override (normalized and collision-resolved, §4.2)
    #[arg(long)]
    pub branch: Option<String>,
    /// Override the project's configured iteration cap
    #[arg(long)]
    pub max_iterations: Option<u32>,
    /// Restrict the run to specific task ids (defaults to the whole sprint)
    #[arg(long = "task", value_name = "TASK_ID")]
    pub task_ids: Vec<String>,
}

pub async fn run(app: &App, args: StartArgs) -> Result<RunId> {
    let task_ids = if args.task_ids.is_empty() { None } else { Some(args.task_ids) };
    let run_id = app
        .coordinator
        .start_run(&args.project_id, &args.sprint_id, args.branch, args.max_iterations, task_ids)
        .await?;
    println!("{run_id}");
    Ok(run_id)
}
