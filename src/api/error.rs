use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::core::RateError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Everything a handler can fail with, rendered as `{error, message}`.
#[derive(Debug)]
pub enum ApiError {
    Rate(RateError),
    /// The query string could not be decoded into the handler's parameters.
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rate(err) => match err {
                RateError::RegistryUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
                RateError::NotFound(_) => StatusCode::NOT_FOUND,
                RateError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                // Only reaches here outside the lenient cross-rate mode.
                RateError::InvalidCurrencyRate => StatusCode::UNPROCESSABLE_ENTITY,
                RateError::InvalidCurrencyCode(_) | RateError::InvalidAmount => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ApiError::Rate(err) => err.tag(),
            ApiError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<RateError> for ApiError {
    fn from(err: RateError) -> Self {
        ApiError::Rate(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let tag = self.tag();
        let message = match self {
            ApiError::Rate(err) => err.to_string(),
            ApiError::InvalidRequest(message) => message,
        };
        if status.is_server_error() {
            tracing::warn!(error = %message, "Request failed");
        }
        (status, Json(ErrorBody { error: tag, message })).into_response()
    }
}
