use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::Error;
use crate::types::{BODY_PARAM, ErrorBody};

/// Message for any failure after the request was accepted.
pub const CHAT_FAILED: &str = "Failed to process chat request";

/// Message for a body that could not be parsed as a chat request.
pub const INVALID_BODY: &str = "Invalid request body";

/// A structured error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorBody::new(message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorBody::new(message))
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody::new("Method not allowed"),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::with_details(CHAT_FAILED, details),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if !err.is_input_error() {
            tracing::error!(error = %err, "chat request failed");
            return Self::internal(err.to_string());
        }
        match err {
            Error::Validation {
                message,
                param: Some(param),
            } if param == BODY_PARAM => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorBody::with_details(INVALID_BODY, message),
            ),
            Error::Validation { message, .. } => Self::bad_request(message),
            _ => Self::bad_request("Invalid mode"),
        }
    }
}
