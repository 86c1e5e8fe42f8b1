//! Directory-backed file store.
//!
//! Each table is a file under `root`. Writes land in a sibling temp file and
//! are renamed into place, so readers see either the old or the new content.
//! Filesystem calls run on tokio's blocking pool.

use crate::error::StoreError;
use crate::store::{check_expected, content_version, RemoteFileStore};
use crate::types::{FileSnapshot, VersionToken};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub struct LocalFileStore {
    root: PathBuf,
    /// Serialises compare-and-replace within this process
    write_lock: Arc<Mutex<()>>,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::Rejected {
                status: 400,
                message: format!("Invalid table path: {}", path),
            });
        }
        Ok(self.root.join(relative))
    }

    fn read_current(full: &Path, path: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("Failed to read {}: {}", path, e))),
        }
    }
}

#[async_trait]
impl RemoteFileStore for LocalFileStore {
    fn backend_tag(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        let full = self.resolve(path)?;
        let owned = path.to_string();
        let current = blocking(move || Self::read_current(&full, &owned)).await?;
        match current {
            Some(content) => Ok(FileSnapshot {
                version: Some(content_version(&content)),
                content,
            }),
            None => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let full = self.resolve(path)?;
        let lock = Arc::clone(&self.write_lock);
        let owned_path = path.to_string();
        let owned_content = content.to_string();
        let expected = expected.cloned();

        let version = blocking(move || {
            let _guard = lock.lock();
            let current =
                Self::read_current(&full, &owned_path)?.map(|c| content_version(&c));
            check_expected(&owned_path, current.as_ref(), expected.as_ref())?;

            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            replace_file(&full, &owned_content)?;
            Ok(content_version(&owned_content))
        })
        .await?;

        tracing::debug!(path, message, "Committed local table file");
        Ok(version)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(format!("Blocking file task failed: {}", e)))?
}

/// Write `content` to a sibling temp file and rename it over `full`
///
/// The temp file is removed when the rename fails.
fn replace_file(full: &Path, content: &str) -> Result<(), StoreError> {
    let tmp = full.with_extension("csv.tmp");
    std::fs::write(&tmp, content)
        .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    if let Err(e) = std::fs::rename(&tmp, full) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StoreError::Io(format!(
            "Failed to replace {}: {}",
            full.display(),
            e
        )));
    }
    Ok(())
}
