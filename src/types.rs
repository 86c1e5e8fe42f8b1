//! Core types for the moldstore CSV table service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// VersionToken: opaque content marker handed out by a file store
///
/// Passed back on write; a write carrying a stale token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// FileSnapshot: one table file as read at a point in time
///
/// `version == None` means the file does not exist yet; the first write creates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub content: String,
    pub version: Option<VersionToken>,
}

impl FileSnapshot {
    /// Snapshot of a file that does not exist
    pub fn missing() -> Self {
        Self {
            content: String::new(),
            version: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.version.is_some()
    }
}

/// Record: column name -> string value
///
/// All values are strings. Column order is owned by the table schema, not the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Value of `column`, or `None` when the record has no such field
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Value of `column`, treating a missing field as empty
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
