//! Commands that change the registry outside of import

use clap::Args;
use depot_store::FsPersistence;

use super::{CliResult, GlobalArgs, Session};

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub id: String,

    /// Delete even if other entities depend on it
    #[arg(long, conflicts_with = "soft")]
    pub force: bool,

    /// Deprecate instead of deleting
    #[arg(long)]
    pub soft: bool,
}

pub async fn remove(global: &GlobalArgs, args: RemoveArgs) -> CliResult {
    let mut session = Session::open(global).await?;
    if args.soft {
        session.engine.try_deprecate(&args.id).await?;
        println!("Deprecated {}", args.id);
    } else {
        session.engine.try_unregister(&args.id, args.force).await?;
        println!("Removed {}", args.id);
    }
    session.save().await
}

pub fn gc(global: &GlobalArgs) -> CliResult {
    let removed = FsPersistence::new(&global.store).collect_garbage()?;
    println!("Removed {} unreferenced snapshot(s)", removed);
    Ok(())
}
