//! Route handlers and the mapping from portal outcomes to HTTP responses.

pub mod auth;
pub mod health;
pub mod resets;
pub mod types;

use crate::eligibility::Rejection;
use crate::portal::PortalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::error;
use types::ErrorResponse;

pub(crate) fn error_response(status: StatusCode, reason: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            reason: reason.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub(crate) fn portal_error_response(err: &PortalError) -> Response {
    match err {
        PortalError::ConnectionFailure(reason) => {
            error!("directory unreachable: {reason}");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "directory-unavailable",
                "The directory is unreachable, try again later.",
            )
        }
        PortalError::Directory(reason) => {
            error!("directory error: {reason}");
            error_response(
                StatusCode::BAD_GATEWAY,
                "directory-error",
                "The directory returned an unexpected error.",
            )
        }
        PortalError::AuthenticationRejected => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid-credentials",
            "Invalid username or password.",
        ),
        PortalError::EligibilityRejected(Rejection::NotAnOperator) => error_response(
            StatusCode::FORBIDDEN,
            Rejection::NotAnOperator.code(),
            Rejection::NotAnOperator.message(),
        ),
        PortalError::EligibilityRejected(rejection) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            rejection.code(),
            rejection.message(),
        ),
        PortalError::PersistenceFailure(err) => {
            error!("{err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence-failure",
                "The request could not be saved, nothing was submitted.",
            )
        }
    }
}
