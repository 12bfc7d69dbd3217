//! Subcommands and the session they share

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use depot_core::logging_facility::Profile;
use depot_core::{EngineConfig, RegistryEngine};
use depot_store::FsPersistence;

pub mod import;
pub mod inspect;
pub mod maintain;
pub mod versions;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding saved snapshots
    #[arg(long, global = true, default_value = ".depot")]
    pub store: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot key; defaults to the configured persistence key
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Log to stderr with this profile (development, production)
    #[arg(long, global = true)]
    pub log: Option<Profile>,
}

/// An engine loaded from the store, saved back on request
pub struct Session {
    pub engine: RegistryEngine,
    key: String,
}

impl Session {
    pub async fn open(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match &global.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        let key = global
            .key
            .clone()
            .unwrap_or_else(|| config.persistence_key.clone());

        let mut engine = RegistryEngine::new(config);
        engine.set_persistence(Arc::new(FsPersistence::new(&global.store)));
        let found = engine.load(Some(&key)).await?;
        tracing::debug!(key = key.as_str(), found, "session opened");

        Ok(Self { engine, key })
    }

    pub async fn save(&self) -> CliResult {
        self.engine.save(Some(&self.key)).await?;
        Ok(())
    }
}
