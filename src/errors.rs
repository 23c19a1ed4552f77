use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Failures surfaced to a client, either as a JSON-RPC error object or, for the
/// plain HTTP surfaces, as an error document with a matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Parse error")]
    Parse,
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn not_found(code: &'static str, message: &'static str) -> Self {
        Self::NotFound { code, message }
    }

    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::BadRequest { .. } | Self::NotFound { .. } => {
                INVALID_PARAMS
            }
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Fault(fault) => Self::Internal(fault.to_string()),
            other => Self::InvalidParams(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message.to_string()),
            Self::Internal(message) => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
            other => (StatusCode::BAD_REQUEST, "invalid_request", other.to_string()),
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}
