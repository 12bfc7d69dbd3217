//! Engine configuration
//!
//! Every field has a default, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! validation_cache_ttl_secs = 60
//!
//! [retention]
//! max_versions = 10
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{DepotError, Result};

/// Default validation cache TTL (5 minutes)
pub const DEFAULT_VALIDATION_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_VERSIONS: usize = 50;
pub const DEFAULT_RETENTION_DAYS: u32 = 90;
pub const DEFAULT_PERSISTENCE_KEY: &str = "depot/registry";

/// Serializable part of the version retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Versions kept per entity before older ones become eligible for removal
    pub max_versions: usize,
    /// Age after which a version becomes eligible for removal
    pub retention_days: u32,
    /// Never remove major versions
    pub keep_milestones: bool,
    /// Never remove versions that carry a tag
    pub keep_tagged_versions: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_versions: DEFAULT_MAX_VERSIONS,
            retention_days: DEFAULT_RETENTION_DAYS,
            keep_milestones: true,
            keep_tagged_versions: true,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation_cache_ttl_secs: u64,
    pub retention: RetentionConfig,
    /// Record a version after every successful update
    pub auto_version_on_update: bool,
    /// Author recorded on versions the engine creates on its own
    pub auto_version_author: String,
    /// Key used by `save`/`load` when the caller does not pass one
    pub persistence_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_cache_ttl_secs: DEFAULT_VALIDATION_CACHE_TTL_SECS,
            retention: RetentionConfig::default(),
            auto_version_on_update: true,
            auto_version_author: "system".to_string(),
            persistence_key: DEFAULT_PERSISTENCE_KEY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document does not parse or a value is
    /// out of range.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| DepotError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed, or a
    /// value is out of range.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| DepotError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.retention.max_versions == 0 {
            return Err(DepotError::InvalidConfig {
                reason: "retention.max_versions must be at least 1".to_string(),
            });
        }
        if self.retention.retention_days == 0 {
            return Err(DepotError::InvalidConfig {
                reason: "retention.retention_days must be at least 1".to_string(),
            });
        }
        if self.auto_version_author.trim().is_empty() {
            return Err(DepotError::InvalidConfig {
                reason: "auto_version_author must not be empty".to_string(),
            });
        }
        if self.persistence_key.trim().is_empty() {
            return Err(DepotError::InvalidConfig {
                reason: "persistence_key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn validation_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.validation_cache_ttl_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.validation_cache_ttl_secs, 300);
        assert_eq!(config.retention.max_versions, 50);
        assert_eq!(config.retention.retention_days, 90);
        assert!(config.retention.keep_milestones);
        assert!(config.retention.keep_tagged_versions);
        assert!(config.auto_version_on_update);
        assert_eq!(config.auto_version_author, "system");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            validation_cache_ttl_secs = 5

            [retention]
            max_versions = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.validation_cache_ttl_secs, 5);
        assert_eq!(config.retention.max_versions, 3);
        assert_eq!(config.retention.retention_days, 90);
        assert_eq!(config.persistence_key, DEFAULT_PERSISTENCE_KEY);
    }

    #[test]
    fn test_zero_max_versions_rejected() {
        let result = EngineConfig::from_toml_str("[retention]\nmax_versions = 0\n");
        assert!(matches!(result, Err(DepotError::InvalidConfig { .. })));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = EngineConfig::from_toml_str("validation_cache_ttl_secs = \"soon\"");
        assert!(matches!(result, Err(DepotError::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auto_version_on_update = false").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(!config.auto_version_on_update);
    }

    #[test]
    fn test_missing_file_is_invalid_config() {
        let result = EngineConfig::from_file("/nonexistent/depot.toml");
        assert!(matches!(result, Err(DepotError::InvalidConfig { .. })));
    }
}
