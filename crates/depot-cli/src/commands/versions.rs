//! Version history commands

use clap::Args;
use depot_core::{HistoryOptions, RollbackOptions};

use super::{CliResult, GlobalArgs, Session};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub id: String,

    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    pub id: String,
    pub version: String,

    #[arg(long)]
    pub reason: Option<String>,

    /// Skip validation of the restored state
    #[arg(long)]
    pub force: bool,

    /// Record the current state before rolling back
    #[arg(long)]
    pub backup: bool,
}

pub async fn history(global: &GlobalArgs, args: HistoryArgs) -> CliResult {
    let session = Session::open(global).await?;
    let options = HistoryOptions {
        limit: args.limit,
        ..HistoryOptions::default()
    };
    for snapshot in session.engine.get_version_history(&args.id, &options) {
        let tags = session.engine.version_tags(&args.id, &snapshot.version);
        println!(
            "{}\t{:?}\t{}\t{}\t{}",
            snapshot.version,
            snapshot.change_type,
            snapshot.created_at.to_rfc3339(),
            snapshot.changelog,
            tags.join(",")
        );
    }
    Ok(())
}

pub async fn rollback(global: &GlobalArgs, args: RollbackArgs) -> CliResult {
    let mut session = Session::open(global).await?;
    let options = RollbackOptions {
        create_backup: args.backup,
        force: args.force,
        operator: Some("cli".to_string()),
        reason: args.reason,
    };
    let entity = session
        .engine
        .try_rollback_to_version(&args.id, &args.version, options)
        .await?;
    session.save().await?;
    println!("Rolled back {} to {} (now {})", args.id, args.version, entity.version);
    Ok(())
}
