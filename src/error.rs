use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    Jwt(jsonwebtoken::errors::Error),
    /// Anti-forgery state token missing or expired. Deliberately carries no
    /// detail about which of the two it was.
    InvalidState,
    /// The identity provider rejected the exchange or could not be reached.
    Provider(String),
    DuplicateUser(String),
    UserNotFound(String),
    Unauthorized(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {}", err),
            AppError::Jwt(err) => write!(f, "JWT error: {}", err),
            AppError::InvalidState => write!(f, "Invalid or expired state token"),
            AppError::Provider(msg) => write!(f, "Identity provider error: {}", msg),
            AppError::DuplicateUser(id) => write!(f, "User already exists: {}", id),
            AppError::UserNotFound(id) => write!(f, "User not found: {}", id),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Jwt(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            AppError::InvalidState => (StatusCode::UNAUTHORIZED, "Login attempt rejected"),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "Identity provider error"),
            AppError::DuplicateUser(_) => (StatusCode::CONFLICT, "User already exists"),
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, "User not found"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
