//! Depot CLI
//!
//! Command-line interface over a registry persisted on disk

use clap::{Parser, Subcommand};
use depot_core::logging_facility::init;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "depot")]
#[command(about = "Depot - indexed entity registry", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register entities from a JSON file
    Import(commands::import::ImportArgs),
    /// List entities matching a filter
    List(commands::inspect::ListArgs),
    /// Print one entity as JSON
    Show(commands::inspect::ShowArgs),
    /// Print registry statistics
    Stats,
    /// Print the metadata export document
    Export(commands::inspect::ExportArgs),
    /// Check indexes, edges and dependencies
    Check,
    /// Delete or deprecate an entity
    Remove(commands::maintain::RemoveArgs),
    /// Show an entity's version history
    History(commands::versions::HistoryArgs),
    /// Restore an entity's content from a recorded version
    Rollback(commands::versions::RollbackArgs),
    /// Delete snapshot blobs no key points at
    Gc,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Some(profile) = cli.global.log {
        init(profile);
    }

    let global = cli.global;
    let result = match cli.command {
        Commands::Import(args) => commands::import::execute(&global, args).await,
        Commands::List(args) => commands::inspect::list(&global, args).await,
        Commands::Show(args) => commands::inspect::show(&global, args).await,
        Commands::Stats => commands::inspect::stats(&global).await,
        Commands::Export(args) => commands::inspect::export(&global, args).await,
        Commands::Check => commands::inspect::check(&global).await,
        Commands::Remove(args) => commands::maintain::remove(&global, args).await,
        Commands::History(args) => commands::versions::history(&global, args).await,
        Commands::Rollback(args) => commands::versions::rollback(&global, args).await,
        Commands::Gc => commands::maintain::gc(&global),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
