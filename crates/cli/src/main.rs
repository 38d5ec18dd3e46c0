// SPDX-License-Identifier: MIT

//! aro - Autonomous Agent Run Orchestrator CLI (§6 Request Layer).

mod commands;
mod output;
mod work_store_fs;

use crate::work_store_fs::FsWorkStore;
use anyhow::{Context, Result};
use aro_coordinator::{DriverRegistry, RunCoordinator, WorkStore};
use aro_core::{RunId, RunStatus, SystemClock, UuidIdGen};
use aro_drivers::{AgentDriver, CliAgentDriver, SdkAgentDriver};
use aro_sandbox::{GitRepositoryAdapter, SandboxManager};
use aro_store::{FsRunStore, FsRunStoreIo, RunStore};
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aro", version, about = "Autonomous Agent Run Orchestrator")]
struct Cli {
    /// Project root directory (defaults to the current directory)
    #[arg(short = 'C', long = "project-root", global = true, value_name = "DIR")]
    project_root: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a run and drive it to a terminal state, printing progress as it goes
    Start(commands::start::StartArgs),
    /// Request cancellation of an in-progress run
    Cancel(commands::cancel::CancelArgs),
    /// Print a run's record and log tail
    Get(commands::get::GetArgs),
    /// List runs for a project, newest first
    List(commands::list::ListArgs),
}

/// Shared application state handed to every command.
pub struct App {
    coordinator: Arc<RunCoordinator<SystemClock, UuidIdGen>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let project_root = cli
        .project_root
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .context("resolving project root")?;

    let app = build_app(&project_root).await?;

    match cli.command {
        Command::Start(args) => {
            let run_id = commands::start::run(&app, args).await?;
            drive_foreground(&app, &run_id).await?;
        }
        Command::Cancel(args) => commands::cancel::run(&app, args).await?,
        Command::Get(args) => commands::get::run(&app, args, cli.output).await?,
        Command::List(args) => commands::list::run(&app, args, cli.output).await?,
    }

    Ok(())
}

async fn build_app(project_root: &std::path::Path) -> Result<App> {
    let clock = SystemClock;
    let runs_dir = project_root.join("plans/runs");
    let store: Arc<dyn RunStore> = Arc::new(FsRunStore::new(runs_dir, FsRunStoreIo, clock.clone()));
    let repo = Arc::new(GitRepositoryAdapter);
    let sandbox = Arc::new(SandboxManager::new(repo));
    let work_store: Arc<dyn WorkStore> = Arc::new(FsWorkStore::new(project_root.clone()));

    let drivers = Arc::new(DriverRegistry::new());
    drivers.register("claude", Arc::new(CliAgentDriver::new("claude", "claude")) as Arc<dyn AgentDriver>);
    drivers.register("claude-sdk", Arc::new(SdkAgentDriver::new("claude-sdk", "claude")) as Arc<dyn AgentDriver>);

    let coordinator = Arc::new(RunCoordinator::new(
        store.clone(),
        sandbox,
        work_store,
        drivers,
        clock,
        UuidIdGen,
        aro_core::env::global_concurrency(),
    ));

    // §7 crash_recovery / §8 P9: repair any `running` record left over from a
    // prior process that never reached a terminal state.
    for run_id in coordinator.recover_orphaned_runs().await? {
        tracing::warn!(run_id = %run_id, "recovered orphaned run at startup");
    }

    Ok(App { coordinator })
}

/// Poll the run to a terminal state and print its progress (§4.7: "callers
/// poll on a 2-5s cadence"). SIGTERM/SIGINT trigger the coordinator's
/// shutdown drain (§5) instead of an abrupt process exit.
async fn drive_foreground(app: &App, run_id: &RunId) -> Result<()> {
    let mut printed_lines = 0usize;

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(2)) => {}
            _ = tokio::signal::ctrl_c() => {
                app.coordinator.shutdown(aro_core::env::DEFAULT_DRAIN_WINDOW).await;
                break;
            }
            #[cfg(unix)]
            _ = sigterm.recv() => {
                app.coordinator.shutdown(aro_core::env::DEFAULT_DRAIN_WINDOW).await;
                break;
            }
        }

        let (record, log) = app.coordinator.get_run(run_id, Some(aro_core::env::MAX_TAIL_LINES)).await?;
        for line in log.iter().skip(printed_lines) {
            println!("{line}");
        }
        printed_lines = log.len();

        if record.status != RunStatus::Queued && record.status != RunStatus::Running {
            println!("--- run {} finished: {} ({:?}) ---", record.run_id, record.status, record.reason);
            break;
        }
    }

    Ok(())
}
