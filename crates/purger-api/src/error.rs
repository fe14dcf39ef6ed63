//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Cache purging is disabled")]
    Disabled,

    #[error("Core error: {0}")]
    Core(#[from] purger_core::CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Disabled => (
                StatusCode::CONFLICT,
                "PURGING_DISABLED",
                "Cache purging is disabled".to_string(),
            ),
            ApiError::Core(e) => match e {
                purger_core::CoreError::InvalidUrl(msg) => {
                    (StatusCode::BAD_REQUEST, "URL_INVALID", msg.clone())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "errors": [{
                "code": code,
                "message": message,
                "detail": null
            }]
        }));

        (status, body).into_response()
    }
}
