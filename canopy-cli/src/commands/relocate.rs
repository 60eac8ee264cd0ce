//! `canopy move` and `canopy copy`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use canopy_core::ProjectPath;

use super::open_workspace;

#[derive(Args, Debug)]
pub struct RelocateArgs {
    /// Folder to move or copy.
    pub src: ProjectPath,

    /// Folder that receives it.
    pub dst_parent: ProjectPath,

    /// New folder name. Defaults to the source name.
    #[arg(long)]
    pub name: Option<String>,

    /// Replace an existing entry with the same name.
    #[arg(long)]
    pub overwrite: bool,
}

impl RelocateArgs {
    pub fn run_move(self) -> Result<()> {
        let workspace = open_workspace()?;
        let entry = workspace
            .manager()
            .move_to(&self.src, &self.dst_parent, self.name.as_deref(), self.overwrite)
            .with_context(|| format!("failed to move {} into {}", self.src, self.dst_parent))?;
        println!("{} Moved {} -> {}", "✓".green(), self.src, entry.path());
        Ok(())
    }

    pub fn run_copy(self) -> Result<()> {
        let workspace = open_workspace()?;
        let entry = workspace
            .manager()
            .copy_to(&self.src, &self.dst_parent, self.name.as_deref(), self.overwrite)
            .with_context(|| format!("failed to copy {} into {}", self.src, self.dst_parent))?;
        println!("{} Copied {} -> {}", "✓".green(), self.src, entry.path());
        Ok(())
    }
}
