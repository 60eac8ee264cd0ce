//! Canopy: project metadata for a workspace of source folders.
//!
//! # Usage
//!
//! ```text
//! canopy init --root <dir> [--remote-file <path> | --remote-url <url>]
//! canopy types
//! canopy list [--json]
//! canopy show <path> [--json]
//! canopy create <path> --type <id> [--mixin <id>]... [--attr k=v]...
//! canopy update <path> [--type <id>] [--mixin <id>]... [--attr k=v]...
//! canopy import <path> --source-type <t> --location <l> [--rewrite]
//! canopy batch <file.yaml> [--rewrite]
//! canopy delete <path>
//! canopy move <src> <dst-parent> [--name <name>]
//! canopy copy <src> <dst-parent> [--name <name>]
//! canopy type add|remove <path> <id>
//! canopy estimate <path> --type <id>
//! canopy resolve <path> [--transient-only]
//! canopy sync
//! canopy agent start [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    agent::AgentCommand,
    import::{BatchArgs, ImportArgs},
    init::InitArgs,
    inspect::{EstimateArgs, ResolveArgs, TypesArgs},
    project::{CreateArgs, DeleteArgs, ListArgs, ShowArgs, TypeCommand, UpdateArgs},
    relocate::RelocateArgs,
    sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "canopy",
    version,
    about = "Resolve, register, and sync project metadata for a workspace",
    long_about = None,
)]
struct Cli {
    /// Log to stderr (`RUST_LOG` adjusts the level).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write workspace settings to ~/.canopy/config.yaml.
    Init(InitArgs),

    /// List registered project types.
    Types(TypesArgs),

    /// List registered projects.
    List(ListArgs),

    /// Show one project.
    Show(ShowArgs),

    /// Create a project folder and register it.
    Create(CreateArgs),

    /// Replace a project's configuration.
    Update(UpdateArgs),

    /// Import sources into a project folder.
    Import(ImportArgs),

    /// Create, import, or update many projects from a YAML file.
    Batch(BatchArgs),

    /// Delete a folder and every project under it.
    Delete(DeleteArgs),

    /// Move a folder; projects travel with it.
    Move(RelocateArgs),

    /// Copy a folder; projects inside the copy are registered.
    Copy(RelocateArgs),

    /// Add or remove a project's types.
    Type {
        #[command(subcommand)]
        command: TypeCommand,
    },

    /// Check how well a folder matches one project type.
    Estimate(EstimateArgs),

    /// List every project type a folder's sources match.
    Resolve(ResolveArgs),

    /// Push local project state to the remote store.
    Sync(SyncArgs),

    /// Run the long-lived workspace agent.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        canopy_agent::init_tracing(false);
    }
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Types(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Show(args) => args.run(),
        Commands::Create(args) => args.run(),
        Commands::Update(args) => args.run(),
        Commands::Import(args) => args.run(),
        Commands::Batch(args) => args.run(),
        Commands::Delete(args) => args.run(),
        Commands::Move(args) => args.run_move(),
        Commands::Copy(args) => args.run_copy(),
        Commands::Type { command } => commands::project::run_type(command),
        Commands::Estimate(args) => args.run(),
        Commands::Resolve(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Agent { command } => commands::agent::run(command),
    }
}
