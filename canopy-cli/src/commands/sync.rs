//! `canopy sync`: push local project state to the remote store.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use canopy_agent::Workspace;
use canopy_sync::{SyncAction, SyncReport};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Emit the sync report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let settings = canopy_agent::config::load_at(&super::home()?)
            .context("failed to load settings; run `canopy init --root <dir>` first")?;
        let workspace = Workspace::open(settings).context("failed to open workspace")?;
        // Loading the registry already reconciles with the remote store.
        let report = workspace.init().context("sync failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    if report.is_noop() {
        println!("{} Already in sync", "✓".green());
        return;
    }
    for action in &report.actions {
        let (label, path) = match action {
            SyncAction::Added(p) => ("added".green(), p),
            SyncAction::Updated(p) => ("updated".yellow(), p),
            SyncAction::Removed(p) => ("removed".red(), p),
        };
        println!("  {label:>8} {path}");
    }
    println!(
        "{} Synced {} change(s) at {}",
        "✓".green(),
        report.actions.len(),
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
