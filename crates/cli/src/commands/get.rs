// SPDX-License-Identifier: MIT

use crate::output::{print_run, OutputFormat};
use crate::App;
use anyhow::Result;
use aro_core::RunId;
use clap::Args;

#[derive(Args)]
pub struct GetArgs {
    /// Run id to fetch
    pub run_id: String,
    /// Number of trailing log lines to include (default 120, max 1000, §4.6)
    #[arg(long)]
    pub tail: Option<usize>,
}

pub async fn run(app: &App, args: GetArgs, format: OutputFormat) -> Result<()> {
    let (record, log) = app.coordinator.get_run(&RunId::new(args.run_id), args.tail).await?;
    print_run(&record, &log, format);
    Ok(())
}
