//! Error types for the store, codec, and service layers.

use thiserror::Error;

/// Errors raised by a `RemoteFileStore` implementation
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Version conflict on {path} (expected {expected})")]
    VersionConflict { path: String, expected: String },

    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::Transient(_)
        )
    }
}

/// Errors raised while decoding CSV text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed CSV at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unsupported table: {0}")]
    UnsupportedTable(String),

    #[error("Unknown column '{column}' for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Item not found: {id_field}={id} in {table}")]
    ItemNotFound {
        table: String,
        id_field: String,
        id: String,
    },

    #[error("Malformed table content: {0}")]
    MalformedInput(#[from] CodecError),

    #[error("Write to {path} gave up after {attempts} attempts: {last_error}")]
    WriteExhausted {
        path: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Store unavailable for {path} after {attempts} attempts: {last_error}")]
    StoreUnavailable {
        path: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Store rejected request: {0}")]
    StoreRejected(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code carried in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::UnsupportedTable(_) => "unsupported_table",
            ApiError::UnknownColumn { .. } => "unknown_column",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ItemNotFound { .. } => "item_not_found",
            ApiError::MalformedInput(_) => "malformed_input",
            ApiError::WriteExhausted { .. } => "write_exhausted",
            ApiError::StoreUnavailable { .. } => "store_unavailable",
            ApiError::StoreRejected(_) => "store_rejected",
            ApiError::ConfigError(_) => "config_error",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { status, message } => {
                ApiError::StoreRejected(format!("status {}: {}", status, message))
            }
            StoreError::Io(message) => ApiError::Internal(message),
            // Retryable and not-found cases are resolved by the writer; reaching here
            // means a caller bypassed it.
            other => ApiError::Internal(other.to_string()),
        }
    }
}
