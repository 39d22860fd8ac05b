//! API error type and the service-level handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hermes_query::{QueryError, StorageError};
use serde_json::{json, Value};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidFilter(e) => ApiError::BadRequest(e.to_string()),
            QueryError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Storage(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = serde_json::to_value(&err)
                    .unwrap_or_else(|_| json!({ "error": err.message() }));
                (status, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Handler for `GET /health`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handler for `GET /`: lists the API versions this server speaks.
pub async fn versions() -> Json<Value> {
    Json(json!({
        "versions": [
            { "id": "v1", "status": "CURRENT", "links": [{ "rel": "self", "href": "/v1/" }] }
        ]
    }))
}
