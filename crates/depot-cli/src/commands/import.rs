//! Bulk registration from a JSON file

use std::path::PathBuf;

use clap::Args;
use depot_core::Entity;

use super::{CliResult, GlobalArgs, Session};

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON array of entities
    pub input: PathBuf,
}

pub async fn execute(global: &GlobalArgs, args: ImportArgs) -> CliResult {
    let source = std::fs::read_to_string(&args.input)
        .map_err(|e| format!("cannot read {}: {}", args.input.display(), e))?;
    let entities: Vec<Entity> = serde_json::from_str(&source)?;

    let mut session = Session::open(global).await?;
    let outcome = session.engine.register_batch(entities).await?;
    session.save().await?;

    println!("Imported {} entities ({} failed)", outcome.success, outcome.failed);
    for item in outcome.details.iter().filter(|d| !d.success) {
        println!(
            "  {}: {}",
            item.id,
            item.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
