use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::{GroupValidationError, PriceError};
use crate::store::StoreError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    InternalServerError,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Row not found".into()),
            StoreError::Conflict => AppError::Conflict("Record already exists".into()),
            StoreError::UnknownUser => AppError::not_found("User"),
            StoreError::PriceNotLower { current } => AppError::Validation(
                PriceError::NotLower { current }.to_string(),
            ),
            StoreError::Database(e) => {
                tracing::error!("Database error: {}", e);
                AppError::InternalServerError
            }
        }
    }
}

impl From<GroupValidationError> for AppError {
    fn from(err: GroupValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<PriceError> for AppError {
    fn from(err: PriceError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg)
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, error_codes::CONFLICT, msg),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, error_to_api_response::<()>(code, message)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_not_found_distinct() {
        let response = AppError::from(StoreError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            AppError::from(StoreError::Database(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::from(StoreError::PriceNotLower { current: 10.0 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_user_is_reported_as_missing_user() {
        match AppError::from(StoreError::UnknownUser) {
            AppError::NotFound(msg) => assert_eq!(msg, "User not found"),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
