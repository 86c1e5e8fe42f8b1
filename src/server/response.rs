//! Response envelopes and error-to-status mapping.

use crate::error::ApiError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Body of every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub code: &'static str,
}

/// HTTP status for an API error
pub fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::UnsupportedTable(_)
        | ApiError::UnknownColumn { .. }
        | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ApiError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
        ApiError::WriteExhausted { .. } => StatusCode::CONFLICT,
        ApiError::MalformedInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ApiError::StoreRejected(_) => StatusCode::BAD_GATEWAY,
        ApiError::ConfigError(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                success: false,
                message: self.to_string(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Fold a body that failed to parse into the standard error envelope
pub fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

pub fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

pub fn bad_path(rejection: PathRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            status_for(&ApiError::UnsupportedTable("x.csv".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ApiError::ItemNotFound {
                table: "molds.csv".into(),
                id_field: "MoldID".into(),
                id: "M9".into(),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ApiError::WriteExhausted {
                path: "molds.csv".into(),
                attempts: 4,
                last_error: "conflict".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ApiError::MalformedInput(CodecError::Malformed {
                line: 2,
                reason: "unterminated quoted field".into(),
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ApiError::StoreUnavailable {
                path: "molds.csv".into(),
                attempts: 4,
                last_error: "timeout".into(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&ApiError::StoreRejected("401".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ApiError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
