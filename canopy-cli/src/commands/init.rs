//! `canopy init --root <dir> [--remote-file <path> | --remote-url <url>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use canopy_agent::{paths::default_remote_path, RemoteSettings, Settings};

/// Write workspace settings.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory backing the workspace root. Created if missing.
    #[arg(long)]
    pub root: PathBuf,

    /// JSON file used as the remote store. Defaults to ~/.canopy/remote.json.
    #[arg(long, conflicts_with = "remote_url")]
    pub remote_file: Option<PathBuf>,

    /// Base URL of an HTTP remote store.
    #[arg(long)]
    pub remote_url: Option<String>,

    /// Request timeout for the HTTP remote store, in seconds.
    #[arg(long, default_value_t = 30, requires = "remote_url")]
    pub timeout_secs: u64,

    /// Background indexing threads. Defaults to available parallelism.
    #[arg(long)]
    pub index_workers: Option<usize>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("cannot create workspace root '{}'", self.root.display()))?;
        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.root.display()))?;

        let remote = match (self.remote_url, self.remote_file) {
            (Some(url), _) => RemoteSettings::Http {
                url,
                timeout_secs: self.timeout_secs,
            },
            (None, Some(path)) => RemoteSettings::File { path },
            (None, None) => RemoteSettings::File {
                path: default_remote_path(&home),
            },
        };

        let mut settings = Settings::new(root.clone(), remote);
        settings.index_workers = self.index_workers;
        let saved = canopy_agent::config::save_at(&home, &settings).context("failed to save settings")?;

        println!("{} Workspace root: {}", "✓".green(), root.display());
        println!("  Saved to: {}", saved.display());
        Ok(())
    }
}
