//! Route handlers for the table API.

use super::response::{bad_body, bad_path, bad_query};
use super::AppState;
use crate::error::ApiError;
use crate::search::{filter_records, SearchQuery};
use crate::table::{LOCATION_LOG, USER_COMMENTS};
use crate::types::Record;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loose JSON object as sent by the browser client
pub type JsonObject = Map<String, Value>;

/// Flatten a JSON object into string fields
///
/// Strings pass through untouched, `null` becomes empty, and other scalars
/// use their JSON text. Nested arrays and objects are rejected.
pub fn record_from_json(object: &JsonObject) -> Result<Record, ApiError> {
    let mut record = Record::new();
    for (key, value) in object {
        record.set(key.as_str(), scalar_text(key, value)?);
    }
    Ok(record)
}

fn scalar_text(key: &str, value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(ApiError::InvalidRequest(format!(
            "field '{}' must be a scalar value",
            key
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddLogRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
    pub data: JsonObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemData {
    pub item_id: Value,
    pub id_field: String,
    #[serde(default)]
    pub updated_fields: JsonObject,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub endpoint: String,
    pub data: UpdateItemData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemData {
    pub item_id: Value,
    pub id_field: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteItemRequest {
    pub endpoint: String,
    pub data: DeleteItemData,
}

#[derive(Debug, Deserialize)]
pub struct LocationLogRequest {
    pub data: JsonObject,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub success: bool,
    pub entry_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLogResponse {
    pub success: bool,
    pub entry_id: String,
    pub item_updated: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub success: bool,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub success: bool,
    pub table: String,
    pub columns: Vec<String>,
    pub count: usize,
    pub records: Vec<Record>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

fn id_text(value: &Value) -> Result<String, ApiError> {
    scalar_text("itemId", value)
}

/// POST /api/add-log
pub async fn add_log(
    State(state): State<AppState>,
    payload: Result<Json<AddLogRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    let endpoint = request
        .endpoint
        .ok_or_else(|| ApiError::InvalidRequest("endpoint is required".to_string()))?;
    let record = record_from_json(&request.data)?;
    let entry_id = state.service.append_log(&endpoint, record).await?;
    Ok(Json(EntryResponse {
        success: true,
        message: format!("Entry added to {}", endpoint.trim()),
        entry_id,
    }))
}

/// POST /api/add-comment
///
/// `endpoint` may be omitted; comments default to the comments table.
pub async fn add_comment(
    State(state): State<AppState>,
    payload: Result<Json<AddLogRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    let endpoint = request
        .endpoint
        .unwrap_or_else(|| USER_COMMENTS.to_string());
    let record = record_from_json(&request.data)?;
    let entry_id = state.service.append_log(&endpoint, record).await?;
    Ok(Json(EntryResponse {
        success: true,
        message: "Comment added".to_string(),
        entry_id,
    }))
}

/// POST /api/update-item
pub async fn update_item(
    State(state): State<AppState>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    let id = id_text(&request.data.item_id)?;
    let patch = record_from_json(&request.data.updated_fields)?;
    let receipt = state
        .service
        .update_item(&request.endpoint, &id, &request.data.id_field, &patch)
        .await?;
    let message = if receipt.committed {
        format!("Item {} updated", id.trim())
    } else {
        format!("Item {} already up to date", id.trim())
    };
    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}

/// POST /api/delete-item
pub async fn delete_item(
    State(state): State<AppState>,
    payload: Result<Json<DeleteItemRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    let id = id_text(&request.data.item_id)?;
    state
        .service
        .delete_item(&request.endpoint, &id, &request.data.id_field)
        .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Item {} deleted", id.trim()),
    }))
}

/// POST /api/locationlog
pub async fn location_log(
    State(state): State<AppState>,
    payload: Result<Json<LocationLogRequest>, JsonRejection>,
) -> Result<Json<LocationLogResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_body)?;
    let record = record_from_json(&request.data)?;
    let outcome = state.service.relocate(record).await?;
    let message = if outcome.item_updated {
        "Location updated and logged".to_string()
    } else {
        format!("Entry added to {}", LOCATION_LOG)
    };
    Ok(Json(LocationLogResponse {
        success: true,
        entry_id: outcome.entry_id,
        item_updated: outcome.item_updated,
        message,
    }))
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// GET /api/tables
pub async fn list_tables(State(state): State<AppState>) -> Json<TablesResponse> {
    let tables = state
        .service
        .registry()
        .list()
        .into_iter()
        .map(|schema| TableInfo {
            name: schema.name.clone(),
            primary_key: schema.primary_key().to_string(),
            columns: schema.columns.clone(),
        })
        .collect();
    Json(TablesResponse {
        success: true,
        tables,
    })
}

/// GET /api/tables/:endpoint
pub async fn read_table(
    State(state): State<AppState>,
    endpoint: Result<Path<String>, PathRejection>,
    params: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let Path(endpoint) = endpoint.map_err(bad_path)?;
    let Query(params) = params.map_err(bad_query)?;
    let schema = state.service.registry().get(&endpoint)?;
    let mut query = SearchQuery::new(params.q.unwrap_or_default());
    if let Some(field) = params.field {
        query = query.in_field(field);
    }
    query.validate(&schema)?;

    let records = state.service.read_records(&schema.name).await?;
    let records = filter_records(&records, &query);
    Ok(Json(RecordsResponse {
        success: true,
        table: schema.name.clone(),
        columns: schema.columns.clone(),
        count: records.len(),
        records,
    }))
}
