//! Remote File Store
//!
//! Durable storage of one blob per table path with optimistic versioning.
//! Every read returns content plus an opaque version token; every write must
//! present the token it read and is rejected atomically if the file moved on.
//!
//! Backends:
//! - [`GitHubFileStore`]: GitHub contents API, blob SHA as token
//! - [`LocalFileStore`]: directory on disk, BLAKE3 content hash as token
//! - [`MemoryFileStore`]: in-process map, BLAKE3 content hash as token

pub mod github;
pub mod local;
pub mod memory;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{ApiError, StoreError};
use crate::types::{FileSnapshot, VersionToken};
use async_trait::async_trait;
use std::sync::Arc;

pub use github::GitHubFileStore;
pub use local::LocalFileStore;
pub use memory::MemoryFileStore;

/// Storage contract shared by all file store backends
#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// Short backend name for logs
    fn backend_tag(&self) -> &'static str;

    /// Fetch the current content and version of `path`
    ///
    /// Returns `StoreError::NotFound` when the file does not exist.
    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError>;

    /// Atomically replace the whole file
    ///
    /// `expected == None` means the file must not exist yet. A mismatch with the
    /// store's current version yields `StoreError::VersionConflict`.
    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError>;

    /// Fetch `path`, treating a missing file as an empty table
    async fn read(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        match self.fetch(path).await {
            Err(StoreError::NotFound { .. }) => Ok(FileSnapshot::missing()),
            other => other,
        }
    }
}

/// Build the backend selected by `config`
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn RemoteFileStore>, ApiError> {
    let store: Arc<dyn RemoteFileStore> = match config.backend {
        StoreBackend::Github => Arc::new(GitHubFileStore::new(&config.github)?),
        StoreBackend::Local => {
            let root = config.local.root.clone().ok_or_else(|| {
                ApiError::ConfigError("store.local.root is required for the local backend".into())
            })?;
            Arc::new(LocalFileStore::new(root))
        }
        StoreBackend::Memory => Arc::new(MemoryFileStore::new()),
    };
    tracing::info!(backend = store.backend_tag(), "Opened file store");
    Ok(store)
}

/// Version token for content-addressed backends
pub(crate) fn content_version(content: &str) -> VersionToken {
    VersionToken::new(blake3::hash(content.as_bytes()).to_hex().to_string())
}

/// Shared compare step for content-addressed backends
pub(crate) fn check_expected(
    path: &str,
    current: Option<&VersionToken>,
    expected: Option<&VersionToken>,
) -> Result<(), StoreError> {
    if current == expected {
        return Ok(());
    }
    Err(StoreError::VersionConflict {
        path: path.to_string(),
        expected: expected
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<absent>".to_string()),
    })
}
