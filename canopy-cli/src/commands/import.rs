//! `canopy import` and `canopy batch`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use canopy_core::{LineConsumer, LineConsumerFactory, ProjectConfig, ProjectPath, SourceStorage};

use super::{open_workspace, parse_key_value};

/// Echoes importer output to stdout, prefixed with the project path.
struct StdoutOutput;

struct StdoutConsumer {
    prefix: String,
}

impl LineConsumer for StdoutConsumer {
    fn write_line(&mut self, line: &str) {
        println!("{} {line}", self.prefix.dimmed());
    }
}

impl LineConsumerFactory for StdoutOutput {
    fn new_consumer(&self, path: &ProjectPath) -> Box<dyn LineConsumer> {
        Box::new(StdoutConsumer {
            prefix: format!("[{path}]"),
        })
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub path: ProjectPath,

    /// Importer to use, e.g. `folder`.
    #[arg(long, default_value = canopy_agent::FOLDER_SOURCE)]
    pub source_type: String,

    /// Where the sources live. Meaning depends on the source type.
    #[arg(long)]
    pub location: String,

    /// Importer parameter as KEY=VALUE.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub parameters: Vec<(String, String)>,

    /// Allow importing into an existing folder.
    #[arg(long)]
    pub rewrite: bool,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let workspace = open_workspace()?;
        let mut source = SourceStorage::new(self.source_type, self.location);
        source.parameters.extend(self.parameters);

        let record = workspace
            .manager()
            .import_project(&self.path, source, self.rewrite, &StdoutOutput)
            .with_context(|| format!("failed to import into {}", self.path))?;
        println!(
            "{} Imported {} [{}]",
            "✓".green(),
            record.path(),
            record.project_type()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML file holding a list of project configs.
    pub file: PathBuf,

    /// Allow importing into existing folders.
    #[arg(long)]
    pub rewrite: bool,
}

impl BatchArgs {
    pub fn run(self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.file)
            .with_context(|| format!("cannot read '{}'", self.file.display()))?;
        let mut configs: Vec<ProjectConfig> = serde_yaml::from_str(&raw)
            .with_context(|| format!("'{}' is not a list of project configs", self.file.display()))?;
        for config in &mut configs {
            if config.name.is_empty() {
                config.name = config.path.name().to_string();
            }
        }

        let workspace = open_workspace()?;
        let records = workspace
            .manager()
            .create_batch_projects(configs, self.rewrite, &StdoutOutput)
            .context("batch failed; no projects were created")?;

        for record in &records {
            if record.problems().is_empty() {
                println!("{} {} [{}]", "✓".green(), record.path(), record.project_type());
            } else {
                println!("{} {} [{}]", "!".yellow(), record.path(), record.project_type());
                for problem in record.problems() {
                    println!("    [{}] {}", problem.code(), problem.message);
                }
            }
        }
        println!("{} project(s) processed", records.len());
        Ok(())
    }
}
