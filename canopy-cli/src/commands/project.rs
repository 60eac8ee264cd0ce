//! `canopy list|show|create|update|delete` and `canopy type add|remove`

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use canopy_core::{ProjectConfig, ProjectPath, ProjectRecord};

use super::{attributes_from, open_workspace, parse_key_value};

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "type")]
    project_type: String,
    #[tabled(rename = "mixins")]
    mixins: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "problems")]
    problems: String,
}

fn state_label(record: &ProjectRecord) -> &'static str {
    match (record.is_detected(), record.is_synced()) {
        (true, _) => "detected",
        (false, true) => "synced",
        (false, false) => "pending",
    }
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let records = workspace.registry().get_projects()?;

        if self.json {
            let summaries: Vec<_> = records.iter().map(|r| r.summary()).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }

        if records.is_empty() {
            println!("No projects registered.");
            println!("Run: canopy create <path> --type <id>");
            return Ok(());
        }

        let rows: Vec<ProjectRow> = records
            .iter()
            .map(|r| ProjectRow {
                path: r.path().to_string(),
                project_type: r.project_type().to_string(),
                mixins: r.mixins().join(", "),
                state: state_label(r).to_string(),
                problems: r
                    .problems()
                    .iter()
                    .map(|p| p.code().to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub path: ProjectPath,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let record = workspace
            .registry()
            .get_project(&self.path)?
            .with_context(|| format!("project {} is not registered", self.path))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record.summary())?);
            return Ok(());
        }

        println!("{}", record.path().to_string().bold());
        println!("  name:  {}", record.name());
        if !record.description().is_empty() {
            println!("  description: {}", record.description());
        }
        println!("  type:  {}", record.project_type());
        if !record.mixins().is_empty() {
            println!("  mixins: {}", record.mixins().join(", "));
        }
        println!("  state: {}", state_label(&record));
        if let Some(source) = record.source() {
            println!(
                "  source: {} {}",
                source.source_type,
                source.location.as_deref().unwrap_or("-")
            );
        }
        if let Some(stack) = record.folder().and_then(canopy_detector::detect_stack) {
            println!("  detected stack: {} ({})", stack.display_name, stack.language);
        }
        if !record.attributes().is_empty() {
            println!("  attributes:");
            for (name, value) in record.attributes() {
                println!("    {name} = {value}");
            }
        }
        for problem in record.problems() {
            println!("  {} {}", format!("[{}]", problem.code()).yellow(), problem.message);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// create / update / delete
// ---------------------------------------------------------------------------

/// Fields shared by `create` and `update`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Display name. Defaults to the last path segment.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Mixin type id. Repeat for several.
    #[arg(long = "mixin", value_name = "ID")]
    pub mixins: Vec<String>,

    /// Attribute value as KEY=VALUE. Repeat a key for multiple values.
    #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub attributes: Vec<(String, String)>,
}

impl ConfigArgs {
    fn apply(self, mut config: ProjectConfig) -> ProjectConfig {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(description) = self.description {
            config.description = description;
        }
        for mixin in self.mixins {
            if !config.mixins.contains(&mixin) {
                config.mixins.push(mixin);
            }
        }
        config.attributes.extend(attributes_from(self.attributes));
        config
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub path: ProjectPath,

    /// Primary project type id (see `canopy types`).
    #[arg(long = "type", short = 't', value_name = "ID")]
    pub project_type: String,

    /// Option handed to the type's create handler, as KEY=VALUE.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CreateArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let config = self
            .config
            .apply(ProjectConfig::new(self.path.clone(), self.project_type));
        let options: BTreeMap<String, String> = self.options.into_iter().collect();

        let record = workspace
            .manager()
            .create_project(config, &options)
            .with_context(|| format!("failed to create {}", self.path))?;
        println!(
            "{} Created {} [{}]",
            "✓".green(),
            record.path(),
            record.project_type()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub path: ProjectPath,

    /// New primary type id.
    #[arg(long = "type", short = 't', value_name = "ID")]
    pub project_type: Option<String>,

    /// Drop the current mixins and attributes before applying the flags.
    #[arg(long)]
    pub replace: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let mut base = match workspace.registry().get_project(&self.path)? {
            Some(existing) if !self.replace => existing.to_config(),
            Some(existing) => {
                ProjectConfig::new(self.path.clone(), existing.project_type()).with_name(existing.name())
            }
            None => ProjectConfig::synthesized(&self.path),
        };
        if let Some(project_type) = self.project_type {
            base.project_type = Some(project_type);
        }
        let config = self.config.apply(base);

        let record = workspace
            .manager()
            .update_project(config)
            .with_context(|| format!("failed to update {}", self.path))?;
        println!(
            "{} Updated {} [{}]",
            "✓".green(),
            record.path(),
            record.project_type()
        );
        for problem in record.problems() {
            println!("  {} {}", format!("[{}]", problem.code()).yellow(), problem.message);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub path: ProjectPath,
}

impl DeleteArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let removed = workspace
            .manager()
            .delete(&self.path)
            .with_context(|| format!("failed to delete {}", self.path))?;
        println!(
            "{} Deleted {} ({} project(s) deregistered)",
            "✓".green(),
            self.path,
            removed.len()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// type add / remove
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
    /// Set the primary type, or add a mixin with --mixin.
    Add {
        path: ProjectPath,
        type_id: String,
        #[arg(long)]
        mixin: bool,
    },

    /// Remove a mixin, or reset the primary type to blank.
    Remove { path: ProjectPath, type_id: String },
}

pub fn run_type(cmd: TypeCommand) -> Result<()> {
    let workspace = open_workspace()?;
    let manager = workspace.manager();
    let record = match cmd {
        TypeCommand::Add {
            path,
            type_id,
            mixin,
        } => manager
            .set_project_type(&path, &type_id, mixin)
            .with_context(|| format!("failed to add type '{type_id}' to {path}"))?,
        TypeCommand::Remove { path, type_id } => manager
            .remove_project_type(&path, &type_id)
            .with_context(|| format!("failed to remove type '{type_id}' from {path}"))?,
    };
    let mixins = record.mixins();
    println!(
        "{} {} [{}]{}",
        "✓".green(),
        record.path(),
        record.project_type(),
        if mixins.is_empty() {
            String::new()
        } else {
            format!(" + {}", mixins.join(", "))
        }
    );
    Ok(())
}
