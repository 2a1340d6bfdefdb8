//! HTTP error envelope.
//!
//! # Responsibility
//! - Map core error enums onto status codes.
//! - Render every failure as `{ "error", "message" }` JSON.
//!
//! # Invariants
//! - Internal errors are logged with detail; the response carries a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use mybestlife_core::auth::RetryAfter;
use mybestlife_core::service::auth_service::AuthError;
use mybestlife_core::service::group_service::GroupServiceError;
use mybestlife_core::RepoError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
    pub retry_after: Option<u64>,
    pub requires_verification: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    requires_verification: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            retry_after: None,
            requires_verification: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn rate_limited(retry: RetryAfter) -> Self {
        Self {
            retry_after: Some(retry.secs),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests, please try again later",
            )
        }
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!("event=http_request module=server status=error error={detail}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: &self.message,
            retry_after: self.retry_after,
            requires_verification: self.requires_verification,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        let code = value.code();
        match value {
            AuthError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, code, message),
            AuthError::InvalidOneTimeToken | AuthError::AlreadyVerified => {
                Self::new(StatusCode::BAD_REQUEST, code, value.to_string())
            }
            AuthError::Conflict(_) => Self::new(StatusCode::CONFLICT, code, value.to_string()),
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => {
                Self::new(StatusCode::UNAUTHORIZED, code, value.to_string())
            }
            AuthError::EmailNotVerified => Self {
                requires_verification: true,
                ..Self::new(StatusCode::UNAUTHORIZED, code, value.to_string())
            },
            AuthError::Locked(retry) => Self {
                retry_after: Some(retry.secs),
                ..Self::new(StatusCode::LOCKED, code, value.to_string())
            },
            AuthError::UserNotFound => Self::new(StatusCode::NOT_FOUND, code, value.to_string()),
            AuthError::Mail(err) => {
                error!("event=mail_send module=server status=error error={err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "Failed to send email",
                )
            }
            AuthError::Token(err) => Self::internal(err),
            AuthError::Repo(err) => Self::from(err),
        }
    }
}

impl From<GroupServiceError> for ApiError {
    fn from(value: GroupServiceError) -> Self {
        match value {
            GroupServiceError::Validation(message) => Self::bad_request(message),
            GroupServiceError::NotFound(_) => Self::not_found(value.to_string()),
            GroupServiceError::Forbidden(message) => Self::forbidden(message),
            GroupServiceError::Repo(err) => Self::from(err),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(_) => Self::not_found(value.to_string()),
            RepoError::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", value.to_string()),
            other => Self::internal(other),
        }
    }
}
