//! API error type with IntoResponse
//!
//! Every failure leaves the server as `{"error": kind, "message": text}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::repos::DbError;
use crate::llm::LlmError;
use crate::models::ValidationError;
use crate::remote::RemoteError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Request understood but not acceptable (400)
    BadRequest { message: String },

    /// SQL rejected by the user database (400)
    Sql { message: String },

    /// Missing or bad credentials (401)
    Unauthorized { message: &'static str },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Unique constraint hit (409)
    Conflict { resource: &'static str, value: String },

    /// User database or language model failed (502)
    Upstream { message: String },

    /// Feature not configured on this server (503)
    ServiceUnavailable { message: String },

    /// User database did not answer in time (504)
    Timeout { seconds: u64 },

    /// Whole request ran past the server's limit (408)
    RequestTimeout { seconds: u64 },

    /// Metadata store error (500, logged)
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } | Self::Sql { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RequestTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::BadRequest { .. } => "bad_request",
            Self::Sql { .. } => "sql_error",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Upstream { .. } => "upstream_error",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::Database(_) | Self::Internal { .. } => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest { message }
            | Self::Sql { message }
            | Self::Upstream { message }
            | Self::ServiceUnavailable { message } => message.clone(),
            Self::Unauthorized { message } => (*message).to_owned(),
            Self::NotFound { resource, id } => format!("{} '{}' not found", resource, id),
            Self::Conflict { resource, value } => format!("{} '{}' already exists", resource, value),
            Self::Timeout { seconds } => {
                format!("database did not respond within {} seconds", seconds)
            }
            Self::RequestTimeout { seconds } => {
                format!("request did not complete within {} seconds", seconds)
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                "an internal error occurred".to_owned()
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                "an internal error occurred".to_owned()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.message(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict { resource, value } => Self::Conflict { resource, value },
            _ => Self::Database(e),
        }
    }
}

impl From<RemoteError> for ApiError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Uri(_) | RemoteError::Unsupported(_) => Self::BadRequest {
                message: e.to_string(),
            },
            RemoteError::Timeout(seconds) => Self::Timeout { seconds },
            RemoteError::Connect(_) | RemoteError::Introspect(_) => {
                tracing::warn!(error = %e, "user database unavailable");
                Self::Upstream {
                    message: e.to_string(),
                }
            }
            RemoteError::Query(_) => Self::Sql {
                message: e.to_string(),
            },
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::NotConfigured => Self::ServiceUnavailable {
                message: e.to_string(),
            },
            _ => Self::Upstream {
                message: e.to_string(),
            },
        }
    }
}
