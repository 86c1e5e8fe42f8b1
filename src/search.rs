//! Record filtering
//!
//! Linear, case-insensitive substring search over rows that the caller
//! already holds. Nothing here caches table contents.

use crate::error::ApiError;
use crate::table::TableSchema;
use crate::types::Record;

/// A single text query, optionally scoped to one column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub field: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            field: None,
        }
    }

    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Blank text matches every row
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Reject a field the table does not declare
    pub fn validate(&self, schema: &TableSchema) -> Result<(), ApiError> {
        match self.field.as_deref().map(str::trim) {
            Some(field) if !field.is_empty() => schema.require_column(field),
            _ => Ok(()),
        }
    }

    fn matches(&self, record: &Record, needle: &str) -> bool {
        match self.field.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            Some(field) => contains_folded(record.value(field), needle),
            None => record.iter().any(|(_, value)| contains_folded(value, needle)),
        }
    }
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Rows of `records` matching `query`, in their original order
pub fn filter_records(records: &[Record], query: &SearchQuery) -> Vec<Record> {
    if query.is_empty() {
        return records.to_vec();
    }
    let needle = query.text.trim().to_lowercase();
    records
        .iter()
        .filter(|record| query.matches(record, &needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Record> {
        vec![
            [("MoldID", "M1"), ("MoldName", "Bumper Left")]
                .into_iter()
                .collect(),
            [("MoldID", "M2"), ("MoldName", "Grille")]
                .into_iter()
                .collect(),
            [("MoldID", "M3"), ("MoldName", "bumper right")]
                .into_iter()
                .collect(),
        ]
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.value("MoldID")).collect()
    }

    #[test]
    fn matches_any_column_case_insensitively() {
        let hits = filter_records(&rows(), &SearchQuery::new("BUMPER"));
        assert_eq!(ids(&hits), vec!["M1", "M3"]);
    }

    #[test]
    fn field_scope_limits_matching() {
        let query = SearchQuery::new("m2").in_field("MoldName");
        assert!(filter_records(&rows(), &query).is_empty());

        let query = SearchQuery::new("m2").in_field("MoldID");
        assert_eq!(ids(&filter_records(&rows(), &query)), vec!["M2"]);
    }

    #[test]
    fn blank_query_returns_everything() {
        assert_eq!(filter_records(&rows(), &SearchQuery::new("  ")).len(), 3);
    }

    #[test]
    fn unknown_field_fails_validation() {
        let schema = TableSchema::new("molds.csv", &["MoldID", "MoldName"], "M").unwrap();
        let query = SearchQuery::new("x").in_field("Color");
        assert!(matches!(
            query.validate(&schema),
            Err(ApiError::UnknownColumn { .. })
        ));
        assert!(SearchQuery::new("x").validate(&schema).is_ok());
    }
}
