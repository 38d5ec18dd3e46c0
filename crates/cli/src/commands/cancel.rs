// SPDX-License-Identifier: MIT

use crate::App;
use anyhow::Result;
use aro_core::RunId;
use clap::Args;

#[derive(Args)]
pub struct CancelArgs {
    /// Run id to cancel
    pub run_id: String,
}

pub async fn run(app: &App, args: CancelArgs) -> Result<()> {
    app.coordinator.cancel_run(&RunId::new(args.run_id)).await?;
    println!("cancellation requested");
    Ok(())
}
