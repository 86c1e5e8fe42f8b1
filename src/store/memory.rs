//! In-memory file store for tests and local development.

use crate::error::StoreError;
use crate::store::{check_expected, content_version, RemoteFileStore};
use crate::types::{FileSnapshot, VersionToken};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe map of path -> content. Not durable.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, String>>,
    commits: AtomicUsize,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a commit
    pub fn insert(&self, path: &str, content: &str) {
        self.files
            .write()
            .insert(path.to_string(), content.to_string());
    }

    /// Current content of `path`, if present
    pub fn content(&self, path: &str) -> Option<String> {
        self.files.read().get(path).cloned()
    }

    /// Number of successful writes since creation
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFileStore for MemoryFileStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        let files = self.files.read();
        let content = files.get(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })?;
        Ok(FileSnapshot {
            content: content.clone(),
            version: Some(content_version(content)),
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        _message: &str,
    ) -> Result<VersionToken, StoreError> {
        let mut files = self.files.write();
        let current = files.get(path).map(|c| content_version(c));
        check_expected(path, current.as_ref(), expected)?;

        files.insert(path.to_string(), content.to_string());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(content_version(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty_snapshot() {
        let store = MemoryFileStore::new();
        assert!(matches!(
            store.fetch("molds.csv").await,
            Err(StoreError::NotFound { .. })
        ));
        let snapshot = store.read("molds.csv").await.unwrap();
        assert_eq!(snapshot, FileSnapshot::missing());
    }

    #[tokio::test]
    async fn create_then_update_with_token() {
        let store = MemoryFileStore::new();
        let v1 = store.write("t.csv", "A\n", None, "create").await.unwrap();
        let snapshot = store.read("t.csv").await.unwrap();
        assert_eq!(snapshot.version.as_ref(), Some(&v1));

        let v2 = store
            .write("t.csv", "A\n1\n", Some(&v1), "update")
            .await
            .unwrap();
        assert_ne!(v1, v2);
        assert_eq!(store.content("t.csv").as_deref(), Some("A\n1\n"));
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn stale_token_is_rejected_without_side_effect() {
        let store = MemoryFileStore::new();
        let v1 = store.write("t.csv", "A\n", None, "create").await.unwrap();
        store
            .write("t.csv", "A\n1\n", Some(&v1), "first")
            .await
            .unwrap();

        let result = store.write("t.csv", "A\n2\n", Some(&v1), "stale").await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.content("t.csv").as_deref(), Some("A\n1\n"));
    }

    #[tokio::test]
    async fn create_over_existing_file_conflicts() {
        let store = MemoryFileStore::new();
        store.insert("t.csv", "A\n");
        let result = store.write("t.csv", "B\n", None, "create").await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.commit_count(), 0);
    }
}
