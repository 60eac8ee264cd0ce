//! Read-only queries: `canopy types`, `canopy estimate`, `canopy resolve`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use canopy_core::{ProjectPath, ProjectTypeDef, SourceEstimation};

use super::open_workspace;

// ---------------------------------------------------------------------------
// types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct TypesArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct TypeRow {
    id: String,
    #[tabled(rename = "name")]
    display_name: String,
    #[tabled(display_with = "yes_no")]
    primary: bool,
    #[tabled(display_with = "yes_no")]
    mixin: bool,
    #[tabled(display_with = "yes_no")]
    persisted: bool,
    #[tabled(display_with = "yes_no")]
    recognizer: bool,
    parents: String,
}

fn yes_no(value: &bool) -> String {
    if *value { "yes" } else { "-" }.to_string()
}

impl From<&ProjectTypeDef> for TypeRow {
    fn from(def: &ProjectTypeDef) -> Self {
        Self {
            id: def.id.clone(),
            display_name: def.display_name.clone(),
            primary: def.primaryable,
            mixin: def.mixable,
            persisted: def.persisted,
            recognizer: def.has_recognizer(),
            parents: def.parents.join(", "),
        }
    }
}

impl TypesArgs {
    pub fn run(self) -> Result<()> {
        let catalog = canopy_detector::builtin_catalog().context("failed to build type catalog")?;
        let rows: Vec<TypeRow> = catalog.list().iter().map(|def| TypeRow::from(&**def)).collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// estimate / resolve
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct EstimateArgs {
    pub path: ProjectPath,

    #[arg(long = "type", short = 't', value_name = "ID")]
    pub project_type: String,

    #[arg(long)]
    pub json: bool,
}

impl EstimateArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let estimation = workspace
            .manager()
            .estimate_project(&self.path, &self.project_type)
            .with_context(|| format!("failed to estimate {} as '{}'", self.path, self.project_type))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&estimation)?);
        } else {
            print_estimation(&estimation);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub path: ProjectPath,

    /// Only report types that are never persisted (e.g. `git`).
    #[arg(long)]
    pub transient_only: bool,

    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let matches = workspace
            .manager()
            .resolve_sources(&self.path, self.transient_only)
            .with_context(|| format!("failed to resolve {}", self.path))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&matches)?);
            return Ok(());
        }
        if matches.is_empty() {
            println!("No project type recognizes {}", self.path);
            return Ok(());
        }
        for estimation in &matches {
            print_estimation(estimation);
        }
        Ok(())
    }
}

fn print_estimation(estimation: &SourceEstimation) {
    let mark = if estimation.matched {
        "✓".green()
    } else {
        "✗".red()
    };
    println!("{mark} {}", estimation.project_type.bold());
    for (name, value) in &estimation.attributes {
        println!("    {name} = {value}");
    }
}
