//! MergeService: orchestrates sources and deserializes to MoldstoreConfig.

use crate::config::sources::{environment, file};
use crate::config::MoldstoreConfig;
use config::{Config, ConfigError};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: serde defaults (lowest) -> optional file -> environment (highest).
    pub fn load(optional_file: &Path) -> Result<MoldstoreConfig, ConfigError> {
        Self::build(optional_file, false)
    }

    /// Same precedence, but the file must exist.
    pub fn load_from_file(path: &Path) -> Result<MoldstoreConfig, ConfigError> {
        Self::build(path, true)
    }

    fn build(path: &Path, required: bool) -> Result<MoldstoreConfig, ConfigError> {
        let builder = Config::builder();
        let builder = file::add_to_builder(builder, path, required);
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use std::fs;

    #[test]
    fn missing_optional_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MergeService::load(&dir.path().join("moldstore.toml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.retry.base_backoff_ms, 200);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MergeService::load_from_file(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moldstore.toml");
        fs::write(
            &path,
            r#"
[server]
port = 8088

[store]
backend = "local"

[store.local]
root = "/srv/tables"

[retry]
max_attempts = 5
"#,
        )
        .unwrap();

        let config = MergeService::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(
            config.store.local.root.as_deref(),
            Some(Path::new("/srv/tables"))
        );
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.jitter_ms, 100);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moldstore.toml");
        fs::write(&path, "[server]\nhost = \"127.0.0.1\"\n").unwrap();

        std::env::set_var("MOLDSTORE__SERVER__HOST", "10.0.0.7");
        let result = MergeService::load_from_file(&path);
        std::env::remove_var("MOLDSTORE__SERVER__HOST");

        assert_eq!(result.unwrap().server.host, "10.0.0.7");
    }
}
