//! API error type with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use projections::ProjectionError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    /// Caller identity headers missing or malformed.
    Unauthenticated(String),
    /// Malformed path or body values.
    BadRequest(String),
    Domain(DomainError),
    Projection(ProjectionError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict
        | ErrorKind::InsufficientStock
        | ErrorKind::InvalidStateTransition => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg)
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidInput.as_str(),
                msg,
            ),
            ApiError::Domain(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    tracing::error!(error = %err, "internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        kind.as_str(),
                        "internal error".to_string(),
                    )
                } else {
                    (status_for(kind), kind.as_str(), err.to_string())
                }
            }
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "read model refresh failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    "internal error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { kind, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
