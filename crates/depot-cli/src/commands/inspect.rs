//! Read-only commands

use std::path::PathBuf;

use clap::Args;
use depot_core::{EntityStatus, EntityType, QueryFilter, SortField, SortKey};

use super::{CliResult, GlobalArgs, Session};

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long = "type")]
    pub entity_type: Option<EntityType>,

    #[arg(long)]
    pub category: Option<String>,

    /// Repeatable; every tag must match
    #[arg(long)]
    pub tag: Vec<String>,

    #[arg(long)]
    pub status: Option<EntityStatus>,

    /// Case-insensitive substring of the name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn list(global: &GlobalArgs, args: ListArgs) -> CliResult {
    let session = Session::open(global).await?;

    let mut filter = QueryFilter::new().sort_by(SortKey::asc(SortField::Id));
    if let Some(t) = args.entity_type {
        filter = filter.entity_type(t);
    }
    if let Some(c) = args.category {
        filter = filter.category(c);
    }
    for tag in args.tag {
        filter = filter.tag(tag);
    }
    if let Some(s) = args.status {
        filter = filter.status(s);
    }
    if let Some(n) = args.name {
        filter = filter.name_contains(n);
    }

    for e in session.engine.query(&filter) {
        println!("{}\t{}\t{}\t{}\t{}", e.id, e.entity_type, e.version, e.status, e.name);
    }
    Ok(())
}

pub async fn show(global: &GlobalArgs, args: ShowArgs) -> CliResult {
    let session = Session::open(global).await?;
    let entity = session
        .engine
        .get(&args.id)
        .ok_or_else(|| format!("entity not found: {}", args.id))?;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

pub async fn stats(global: &GlobalArgs) -> CliResult {
    let session = Session::open(global).await?;
    println!("{}", serde_json::to_string_pretty(&session.engine.get_stats())?);
    Ok(())
}

pub async fn export(global: &GlobalArgs, args: ExportArgs) -> CliResult {
    let session = Session::open(global).await?;
    let document = session.engine.export()?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, document)?;
            println!("Exported {} entities to {}", session.engine.len(), path.display());
        }
        None => println!("{}", document),
    }
    Ok(())
}

/// Report every integrity problem; fails if there is any
pub async fn check(global: &GlobalArgs) -> CliResult {
    let session = Session::open(global).await?;
    let engine = &session.engine;

    let mut problems = engine.check_integrity();
    problems.extend(engine.missing_dependencies().iter().map(ToString::to_string));
    problems.extend(
        engine
            .detect_cycles()
            .into_iter()
            .map(|cycle| format!("cycle: {}", cycle.join(" -> "))),
    );

    if problems.is_empty() {
        println!("OK: {} entities", engine.len());
        return Ok(());
    }
    for problem in &problems {
        println!("{}", problem);
    }
    Err(format!("{} problem(s) found", problems.len()).into())
}
