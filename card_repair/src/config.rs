//! Repair configuration.
//!
//! JSON file, every field optional. Command-line flags override it.
//!
//! ```json
//! {
//!   "database": "cards.db",
//!   "passes": ["trim-texts", "audit-flags"],
//!   "backup_dir": "backups",
//!   "log_file": "repair.log",
//!   "create_schema": false
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::passes::PassKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("passes must not be empty")]
    NoPasses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    pub database: Option<PathBuf>,
    /// Run order of the passes.
    pub passes: Vec<PassKind>,
    /// Write a table backup here before the first pass.
    pub backup_dir: Option<PathBuf>,
    /// Diagnostic log destination; stdout when unset.
    pub log_file: Option<PathBuf>,
    /// Create the card table when it does not exist.
    pub create_schema: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            database: None,
            passes: PassKind::DEFAULT_ORDER.to_vec(),
            backup_dir: None,
            log_file: None,
            create_schema: false,
        }
    }
}

impl RepairConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        if config.passes.is_empty() {
            return Err(ConfigError::NoPasses);
        }
        Ok(config)
    }
}
