//! Table Service
//!
//! Table-level operations expressed as mutations run through the
//! [`RetryingWriter`]. Each operation touches exactly one table file; two
//! tables are never mutated atomically together.

use crate::codec;
use crate::error::ApiError;
use crate::table::{
    generate_id, TableRegistry, TableSchema, CUTTERS, LOCATION_LOG, MOLDS, USER_COMMENTS,
};
use crate::types::Record;
use crate::writer::{Mutation, RetryingWriter, WriteReceipt};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Column patched on the referenced item when a location log entry is added
pub const RACK_LAYER_COLUMN: &str = "RackLayerID";

/// Result of a location change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationOutcome {
    pub entry_id: String,
    /// Whether a mold or cutter row had its rack layer patched
    pub item_updated: bool,
}

/// CRUD facade over the registered tables
#[derive(Clone)]
pub struct TableService {
    registry: Arc<TableRegistry>,
    writer: RetryingWriter,
}

impl TableService {
    pub fn new(registry: Arc<TableRegistry>, writer: RetryingWriter) -> Self {
        Self { registry, writer }
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn writer(&self) -> &RetryingWriter {
        &self.writer
    }

    /// Decode the current rows of `table`; a missing file is an empty table
    pub async fn read_records(&self, table: &str) -> Result<Vec<Record>, ApiError> {
        let schema = self.registry.get(table)?;
        let snapshot = self.writer.read(&schema.name).await?;
        Ok(codec::decode(&snapshot.content, &schema)?)
    }

    /// Prepend `record` to `table` and return its primary key
    ///
    /// A caller-supplied key is reused; if a row with that key already exists
    /// nothing is written. A missing or blank key is generated here, once,
    /// before any attempt runs.
    #[instrument(skip(self, record), fields(table = %table))]
    pub async fn append_log(&self, table: &str, record: Record) -> Result<String, ApiError> {
        let schema = self.registry.get(table)?;
        let dropped = schema.foreign_fields(&record);
        if !dropped.is_empty() {
            debug!(fields = ?dropped, "Dropping fields outside the table schema");
        }

        let mut row = schema.normalize(&record);
        let key = schema.primary_key().to_string();
        let entry_id = match row.value(&key).trim() {
            "" => generate_id(&schema.id_prefix, Utc::now()),
            supplied => supplied.to_string(),
        };
        row.set(key.as_str(), entry_id.as_str());

        let message = format!("Add {} to {}", entry_id, schema.name);
        let receipt = self
            .writer
            .run_with_retry(&schema.name, &message, |current| {
                let mut rows = codec::decode(current, &schema)?;
                if rows.iter().any(|r| r.value(&key).trim() == entry_id) {
                    return Ok(Mutation::Unchanged);
                }
                rows.insert(0, row.clone());
                Ok(Mutation::Replace(codec::encode(&rows, &schema)))
            })
            .await?;

        if receipt.committed {
            info!(entry_id = %entry_id, attempts = receipt.attempts, "Appended entry");
        } else {
            info!(entry_id = %entry_id, "Entry already present; append skipped");
        }
        Ok(entry_id)
    }

    /// Merge `patch` over the first row whose `id_field` equals `id`
    ///
    /// Only schema columns present in `patch` change; every other column and
    /// row passes through untouched.
    #[instrument(skip(self, patch), fields(table = %table, id_field = %id_field, id = %id))]
    pub async fn update_item(
        &self,
        table: &str,
        id: &str,
        id_field: &str,
        patch: &Record,
    ) -> Result<WriteReceipt, ApiError> {
        let schema = self.registry.get(table)?;
        let (id, id_field) = lookup_key(&schema, id, id_field)?;

        let ignored = schema.foreign_fields(patch);
        if !ignored.is_empty() {
            warn!(fields = ?ignored, "Ignoring patch fields outside the table schema");
        }
        let patch: Vec<(String, String)> = patch
            .iter()
            .filter(|(column, _)| schema.has_column(column))
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();

        let message = format!("Update {}={} in {}", id_field, id, schema.name);
        let receipt = self
            .writer
            .run_with_retry(&schema.name, &message, |current| {
                let mut rows = codec::decode(current, &schema)?;
                let index = find_row(&rows, id_field, id)
                    .ok_or_else(|| not_found(&schema, id_field, id))?;
                let row = &mut rows[index];
                let before = row.clone();
                for (column, value) in &patch {
                    row.set(column.as_str(), value.as_str());
                }
                if *row == before {
                    return Ok(Mutation::Unchanged);
                }
                let key = schema.primary_key();
                let new_key = row.value(key).trim().to_string();
                if new_key != before.value(key).trim() {
                    check_key_change(&rows, index, key, &new_key)?;
                }
                Ok(Mutation::Replace(codec::encode(&rows, &schema)))
            })
            .await?;

        info!(committed = receipt.committed, attempts = receipt.attempts, "Updated item");
        Ok(receipt)
    }

    /// Remove the first row whose `id_field` equals `id`
    #[instrument(skip(self), fields(table = %table))]
    pub async fn delete_item(
        &self,
        table: &str,
        id: &str,
        id_field: &str,
    ) -> Result<WriteReceipt, ApiError> {
        let schema = self.registry.get(table)?;
        let (id, id_field) = lookup_key(&schema, id, id_field)?;

        let message = format!("Delete {}={} from {}", id_field, id, schema.name);
        let receipt = self
            .writer
            .run_with_retry(&schema.name, &message, |current| {
                let mut rows = codec::decode(current, &schema)?;
                let index = find_row(&rows, id_field, id)
                    .ok_or_else(|| not_found(&schema, id_field, id))?;
                rows.remove(index);
                Ok(Mutation::Replace(codec::encode(&rows, &schema)))
            })
            .await?;

        info!(attempts = receipt.attempts, "Deleted item");
        Ok(receipt)
    }

    /// Append a row to the comments table
    pub async fn add_comment(&self, record: Record) -> Result<String, ApiError> {
        self.append_log(USER_COMMENTS, record).await
    }

    /// Record a rack location change
    ///
    /// When the entry names a mold (or cutter) and a new rack layer, that
    /// item's rack layer is patched first; a missing item fails the whole
    /// request before the log is written. The log row is appended afterwards
    /// as an independent write.
    #[instrument(skip(self, record))]
    pub async fn relocate(&self, record: Record) -> Result<RelocationOutcome, ApiError> {
        let new_layer = record.value("NewRackLayer").trim().to_string();
        let target = [(MOLDS, "MoldID"), (CUTTERS, "CutterID")]
            .into_iter()
            .find(|(_, id_field)| !record.value(id_field).trim().is_empty());

        let mut item_updated = false;
        if let (Some((table, id_field)), false) = (target, new_layer.is_empty()) {
            let mut patch = Record::new();
            patch.set(RACK_LAYER_COLUMN, new_layer.as_str());
            self.update_item(table, record.value(id_field), id_field, &patch)
                .await?;
            item_updated = true;
        }

        let entry_id = self.append_log(LOCATION_LOG, record).await?;
        Ok(RelocationOutcome {
            entry_id,
            item_updated,
        })
    }
}

/// Validate and trim the lookup pair for update/delete
fn lookup_key<'a>(
    schema: &TableSchema,
    id: &'a str,
    id_field: &'a str,
) -> Result<(&'a str, &'a str), ApiError> {
    let id_field = id_field.trim();
    schema.require_column(id_field)?;
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::InvalidRequest("itemId must not be empty".to_string()));
    }
    Ok((id, id_field))
}

/// Reject a primary-key rewrite that blanks the key or collides with another row
fn check_key_change(
    rows: &[Record],
    index: usize,
    key: &str,
    new_key: &str,
) -> Result<(), ApiError> {
    if new_key.is_empty() {
        return Err(ApiError::InvalidRequest(format!("{} must not be empty", key)));
    }
    let taken = rows
        .iter()
        .enumerate()
        .any(|(i, r)| i != index && r.value(key).trim() == new_key);
    if taken {
        return Err(ApiError::InvalidRequest(format!(
            "{}={} already exists",
            key, new_key
        )));
    }
    Ok(())
}

fn find_row(rows: &[Record], id_field: &str, id: &str) -> Option<usize> {
    rows.iter().position(|r| r.value(id_field).trim() == id)
}

fn not_found(schema: &TableSchema, id_field: &str, id: &str) -> ApiError {
    ApiError::ItemNotFound {
        table: schema.name.clone(),
        id_field: id_field.to_string(),
        id: id.to_string(),
    }
}
