//! Table schema: ordered columns and record normalization.

use crate::error::ApiError;
use crate::types::Record;
use serde::Serialize;
use std::collections::HashSet;

/// A named CSV-backed table with a fixed column order
///
/// The first column is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// File name, e.g. `molds.csv`; also the table's API identifier
    pub name: String,
    /// Canonical column order (CSV header)
    pub columns: Vec<String>,
    /// Prefix for server-generated primary keys
    pub id_prefix: String,
}

impl TableSchema {
    /// Create a schema, rejecting empty, blank, or duplicate column lists
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        id_prefix: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ApiError::ConfigError("Table name cannot be empty".to_string()));
        }
        if columns.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "Table {} must declare at least one column",
                name
            )));
        }

        let mut seen = HashSet::new();
        for column in columns {
            if column.trim().is_empty() || column.trim() != *column {
                return Err(ApiError::ConfigError(format!(
                    "Table {} has an invalid column name {:?}",
                    name, column
                )));
            }
            if !seen.insert(*column) {
                return Err(ApiError::ConfigError(format!(
                    "Table {} declares column {} twice",
                    name, column
                )));
            }
        }

        Ok(Self {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            id_prefix: id_prefix.into(),
        })
    }

    /// Primary-key column (always the first)
    pub fn primary_key(&self) -> &str {
        &self.columns[0]
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Require `column` to be part of this schema
    pub fn require_column(&self, column: &str) -> Result<(), ApiError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(ApiError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }

    /// Project `input` onto exactly this schema's columns
    ///
    /// Missing fields become empty strings; fields outside the schema are dropped.
    pub fn normalize(&self, input: &Record) -> Record {
        self.columns
            .iter()
            .map(|column| (column.clone(), input.value(column).to_string()))
            .collect()
    }

    /// Fields of `input` that `normalize` would drop
    pub fn foreign_fields<'a>(&self, input: &'a Record) -> Vec<&'a str> {
        input
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !self.has_column(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molds() -> TableSchema {
        TableSchema::new("molds.csv", &["MoldID", "MoldCode", "MoldName"], "M").unwrap()
    }

    #[test]
    fn primary_key_is_first_column() {
        assert_eq!(molds().primary_key(), "MoldID");
    }

    #[test]
    fn normalize_fills_missing_and_drops_extra() {
        let input: Record = [("MoldName", "Foo"), ("Color", "red")].into_iter().collect();
        let schema = molds();
        let normalized = schema.normalize(&input);

        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized.get("MoldID"), Some(""));
        assert_eq!(normalized.get("MoldCode"), Some(""));
        assert_eq!(normalized.get("MoldName"), Some("Foo"));
        assert_eq!(normalized.get("Color"), None);
        assert_eq!(schema.foreign_fields(&input), vec!["Color"]);
    }

    #[test]
    fn rejects_duplicate_and_blank_columns() {
        assert!(TableSchema::new("t.csv", &["A", "A"], "T").is_err());
        assert!(TableSchema::new("t.csv", &["A", " "], "T").is_err());
        assert!(TableSchema::new("t.csv", &[" A"], "T").is_err());
        assert!(TableSchema::new("t.csv", &[], "T").is_err());
    }

    #[test]
    fn require_column_reports_unknown_column() {
        let err = molds().require_column("Nope").unwrap_err();
        assert!(matches!(err, ApiError::UnknownColumn { .. }));
    }
}
