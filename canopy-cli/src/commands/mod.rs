pub mod agent;
pub mod import;
pub mod init;
pub mod inspect;
pub mod project;
pub mod relocate;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use canopy_agent::Workspace;
use canopy_core::{AttributeValue, Attributes};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Load settings, assemble the workspace, and bring the registry up to date.
pub(crate) fn open_workspace() -> Result<Workspace> {
    let settings = canopy_agent::config::load_at(&home()?)
        .context("failed to load settings; run `canopy init --root <dir>` first")?;
    let workspace = Workspace::open(settings).context("failed to open workspace")?;
    workspace.init().context("failed to load projects")?;
    Ok(workspace)
}

/// clap value parser for `KEY=VALUE`.
pub(crate) fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Repeated keys collect into one multi-valued attribute.
pub(crate) fn attributes_from(pairs: Vec<(String, String)>) -> Attributes {
    let mut attributes = Attributes::new();
    for (key, value) in pairs {
        attributes
            .entry(key)
            .or_insert_with(AttributeValue::default)
            .0
            .push(value);
    }
    attributes
}
