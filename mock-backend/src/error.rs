use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every error leaves the backend as `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No JSON data provided")]
    MalformedPayload,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Todo not found")]
    TodoNotFound,

    #[error("Endpoint not found")]
    UnknownEndpoint,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload | AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::TodoNotFound | AppError::UnknownEndpoint => StatusCode::NOT_FOUND,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
