use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::credentials::{AuthError, DUPLICATE_ACCOUNT};
use crate::auth::password::PasswordError;
use crate::auth::reset::ResetError;
use crate::auth::session::SessionError;
use crate::db::RepositoryError;

/// Message sent for every failure whose detail must stay server side.
pub const INTERNAL_MESSAGE: &str = "Something went wrong";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid username/password, Try again!")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::DuplicateAccount => AppError::Conflict(DUPLICATE_ACCOUNT.to_string()),
            AuthError::Repository(e) => AppError::Repository(e),
            AuthError::Password(e) => AppError::Password(e),
        }
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::NoAccount => AppError::BadRequest(ResetError::NoAccount.to_string()),
            ResetError::TokenInvalid => AppError::BadRequest(ResetError::TokenInvalid.to_string()),
            ResetError::Repository(e) => AppError::Repository(e),
            ResetError::Password(e) => AppError::Password(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Conflict(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Repository(_)
            | AppError::Password(_)
            | AppError::Session(_)
            | AppError::Internal(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
