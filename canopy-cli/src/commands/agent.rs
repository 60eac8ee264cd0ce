//! `canopy agent start`

use anyhow::{Context, Result};
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Run in the foreground until ctrl-c.
    Start {
        /// Log as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cmd: AgentCommand) -> Result<()> {
    match cmd {
        AgentCommand::Start { json } => {
            let home = super::home()?;
            canopy_agent::start_blocking(&home, json).context("agent exited with an error")
        }
    }
}
