use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::pos::CartError;
use crate::services::uploads::UploadError;
use crate::storage::StorageError;

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    /// The request body could not be read at all, e.g. broken multipart.
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Internal(detail) => {
                log::error!("Request failed: {}", detail);
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(message) => ApiError::Conflict(message),
            StorageError::InvalidReference(message) => ApiError::Validation(message),
            StorageError::InvalidValue(message) => ApiError::Validation(message),
            err @ StorageError::InsufficientStock { .. } => ApiError::Validation(err.to_string()),
            StorageError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let conflict: ApiError = StorageError::Conflict("dup".into()).into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let stock: ApiError = StorageError::InsufficientStock {
            medicine_id: 3,
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(stock.status_code(), StatusCode::BAD_REQUEST);

        let db: ApiError = StorageError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upload_errors_are_bad_requests() {
        let invalid: ApiError = UploadError::InvalidType.into();
        assert!(matches!(invalid, ApiError::BadRequest(_)));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let io: ApiError = UploadError::Io(std::io::Error::other("disk full")).into();
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let negative: ApiError = StorageError::InvalidValue("negative".into()).into();
        assert_eq!(negative.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response = ApiError::Internal("connection reset".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
