//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::MoldstoreConfig;
use config::ConfigError;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "moldstore.toml";

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `./moldstore.toml` (if present) and environment.
    pub fn load(working_dir: &Path) -> Result<MoldstoreConfig, ConfigError> {
        MergeService::load(&Self::default_config_path(working_dir))
    }

    /// Load configuration from a specific file; the file must exist.
    pub fn load_from_file(path: &Path) -> Result<MoldstoreConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Load from an explicit file when given, otherwise from the working directory.
    pub fn load_with_override(
        config_file: Option<&Path>,
        working_dir: &Path,
    ) -> Result<MoldstoreConfig, ConfigError> {
        match config_file {
            Some(path) => Self::load_from_file(path),
            None => Self::load(working_dir),
        }
    }

    fn default_config_path(working_dir: &Path) -> PathBuf {
        working_dir.join(DEFAULT_CONFIG_FILE)
    }
}
