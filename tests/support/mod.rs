//! Store doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use moldstore::error::StoreError;
use moldstore::service::TableService;
use moldstore::store::{MemoryFileStore, RemoteFileStore};
use moldstore::table::{TableRegistry, TableSchema};
use moldstore::types::{FileSnapshot, VersionToken};
use moldstore::writer::{RetryPolicy, RetryingWriter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Registry with only the three-column molds table
pub fn molds_registry() -> TableRegistry {
    let mut registry = TableRegistry::new();
    registry.register(
        TableSchema::new("molds.csv", &["MoldID", "MoldCode", "MoldName"], "M").unwrap(),
    );
    registry
}

pub fn service_over(store: Arc<dyn RemoteFileStore>, max_attempts: u32) -> TableService {
    let writer = RetryingWriter::new(store, RetryPolicy::immediate(max_attempts));
    TableService::new(Arc::new(molds_registry()), writer)
}

/// What the wrapped store does on a given write
#[derive(Clone)]
pub enum Interference {
    /// Fail with a version conflict without touching the file
    Conflict,
    /// Let another writer commit this content first, then forward the write
    Competitor(String),
    /// Fail with a transient error
    Transient,
}

/// Memory store that interferes with the first writes it sees
pub struct ContendedStore {
    pub inner: MemoryFileStore,
    script: Mutex<Vec<Interference>>,
    pub fetches: AtomicU32,
    pub writes: AtomicU32,
}

impl ContendedStore {
    /// `script[i]` applies to write `i`; later writes pass through
    pub fn new(script: Vec<Interference>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            inner: MemoryFileStore::new(),
            script: Mutex::new(script),
            fetches: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    pub fn conflict_once() -> Self {
        Self::new(vec![Interference::Conflict])
    }

    pub fn always(interference: Interference) -> Self {
        Self::new(vec![interference; 64])
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFileStore for ContendedStore {
    fn backend_tag(&self) -> &'static str {
        "contended"
    }

    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(path).await
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop();
        match next {
            Some(Interference::Conflict) => Err(StoreError::VersionConflict {
                path: path.to_string(),
                expected: expected.map(|v| v.to_string()).unwrap_or_default(),
            }),
            Some(Interference::Competitor(competing)) => {
                self.inner.insert(path, &competing);
                self.inner.write(path, content, expected, message).await
            }
            Some(Interference::Transient) => {
                Err(StoreError::Transient("connection reset".to_string()))
            }
            None => self.inner.write(path, content, expected, message).await,
        }
    }
}

/// Store whose first `failures` reads fail transiently
pub struct FlakyStore {
    pub inner: MemoryFileStore,
    remaining: AtomicU32,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryFileStore::new(),
            remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl RemoteFileStore for FlakyStore {
    fn backend_tag(&self) -> &'static str {
        "flaky"
    }

    async fn fetch(&self, path: &str) -> Result<FileSnapshot, StoreError> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Transient("503 from upstream".to_string()));
        }
        self.inner.fetch(path).await
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        self.inner.write(path, content, expected, message).await
    }
}
