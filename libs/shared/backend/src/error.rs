use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Session is missing or expired: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Backend rejected the change as conflicting: {0}")]
    Conflict(String),

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => BackendError::Unauthorized(message),
            404 => BackendError::NotFound(message),
            409 => BackendError::Conflict(message),
            400 | 422 => BackendError::Rejected(message),
            _ => BackendError::Api { status, message },
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(msg) => AppError::Auth(msg),
            BackendError::NotFound(msg) => AppError::NotFound(msg),
            BackendError::Conflict(msg) => AppError::Conflict(msg),
            BackendError::Rejected(msg) => AppError::BadRequest(msg),
            other => AppError::ExternalService(other.to_string()),
        }
    }
}
