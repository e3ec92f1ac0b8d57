//! Custom error types for the user service
//!
//! Every failure reaching a handler boundary is an [`ApiError`]. Its
//! `IntoResponse` implementation is the single place where status codes and
//! client-facing messages are chosen.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::{error, warn};

use crate::response::ApiResponse;

const GENERIC_SERVER_MESSAGE: &str = "Something went wrong";

/// Custom error type for the user service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid or expired credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Missing user or entity (404)
    #[error("{0}")]
    NotFound(String),

    /// Request body failed validation (400)
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Malformed request that is not a schema violation (400)
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate of an existing unique record (409)
    #[error("{0}")]
    Conflict(String),

    /// Rate limit exceeded (429)
    #[error("Too many requests from this IP, please try again later.")]
    TooManyRequests,

    /// The server is missing configuration it needs (500)
    #[error("Server configuration error: {0}")]
    Configuration(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other server-side failure (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Internal detail of a server error, attached to the response so that the
/// development-mode middleware can expose it.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn user_not_found() -> Self {
        Self::not_found("User")
    }

    /// Status code and client-facing message
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
            ),
            Self::Database(e) => classify_database_error(e),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_SERVER_MESSAGE.to_string(),
            ),
        }
    }
}

/// Map a driver error onto the client-facing taxonomy.
///
/// Constraint violations are recognised by their SQLSTATE class first and by
/// the server's message text second.
fn classify_database_error(err: &sqlx::Error) -> (StatusCode, String) {
    let classified = match err {
        sqlx::Error::RowNotFound => Some((StatusCode::NOT_FOUND, "Resource not found")),
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => Some((StatusCode::CONFLICT, "Duplicate entry")),
            ErrorKind::ForeignKeyViolation => Some((StatusCode::BAD_REQUEST, "Invalid reference")),
            ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                Some((StatusCode::BAD_REQUEST, "Invalid data format"))
            }
            _ => {
                let message = db.message();
                if message.contains("duplicate key") {
                    Some((StatusCode::CONFLICT, "Duplicate entry"))
                } else if message.contains("foreign key") {
                    Some((StatusCode::BAD_REQUEST, "Invalid reference"))
                } else {
                    None
                }
            }
        },
        _ => None,
    };

    let (status, message) =
        classified.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, GENERIC_SERVER_MESSAGE));
    (status, message.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!("{}", self);
        } else if status == StatusCode::CONFLICT {
            warn!("{}", self);
        }

        let errors = match self {
            Self::Validation(ref errors) => Some(errors.clone()),
            _ => None,
        };

        let mut response = (status, ApiResponse::failure(message, errors)).into_response();

        if status.is_server_error() {
            response.extensions_mut().insert(ErrorDetail {
                message: self.to_string(),
                detail: format!("{:?}", self),
            });
        }

        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![rejection.body_text()])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(vec![rejection.body_text()])
    }
}

impl From<common::error::DatabaseError> for ApiError {
    fn from(err: common::error::DatabaseError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let response = ApiError::Validation(vec![
            "email is required".to_string(),
            "role must be one of user, psychiatrist".to_string(),
        ])
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn server_errors_hide_their_cause() {
        let response = ApiError::Internal("pool exhausted".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().cloned().unwrap();
        assert!(detail.message.contains("pool exhausted"));

        let body = body_json(response).await;
        assert_eq!(body["message"], GENERIC_SERVER_MESSAGE);
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn configuration_errors_name_the_problem() {
        let response = ApiError::Configuration("JWT secret missing".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Server configuration error");
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (ApiError::Unauthorized("Invalid token".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("Insufficient permissions".into()), StatusCode::FORBIDDEN),
            (ApiError::user_not_found(), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("Invalid user id".into()), StatusCode::BAD_REQUEST),
            (ApiError::Conflict("User already exists".into()), StatusCode::CONFLICT),
            (ApiError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Database(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND),
            (ApiError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_and_message().0, expected, "{:?}", error);
        }
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(ApiError::user_not_found().to_string(), "User not found");
    }
}
