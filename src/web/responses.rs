use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::store::StoreError;

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error half of every handler result: a status code with the canonical
/// JSON body.
pub type ApiError = (StatusCode, Json<ApiMessage>);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiMessage::new(message)))
}

/// Maps store failures onto HTTP statuses: a missing document is the
/// caller's 404, anything else is reported as a 500 with the supplied
/// message.
pub fn store_error(err: &StoreError, not_found: &str, failure: &str) -> ApiError {
    if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, not_found)
    } else {
        json_error(StatusCode::INTERNAL_SERVER_ERROR, failure)
    }
}
