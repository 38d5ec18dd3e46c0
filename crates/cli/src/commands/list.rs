// SPDX-License-Identifier: MIT

use crate::output::{print_run_list, OutputFormat};
use crate::App;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct ListArgs {
    /// Project id to list runs for
    pub project_id: String,
}

pub async fn run(app: &App, args: ListArgs, format: OutputFormat) -> Result<()> {
    let records = app.coordinator.list(&args.project_id).await?;
    print_run_list(&records, format);
    Ok(())
}
