use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use error_stack::{report, Report};
use serde::Serialize;

use crate::domain::GuardError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Handler error. Wraps the whole report so the log line carries every
/// attachment while the client only sees the top-level message.
#[derive(Debug)]
pub struct ApiError(pub Report<GuardError>);

pub type ApiResult<T> = Result<T, ApiError>;

pub const fn status_code(error: &GuardError) -> StatusCode {
    match error {
        GuardError::Unauthenticated => StatusCode::UNAUTHORIZED,
        GuardError::NotFound(_) => StatusCode::NOT_FOUND,
        GuardError::Forbidden | GuardError::Banned | GuardError::ServiceAccountNoAccess { .. } => {
            StatusCode::FORBIDDEN
        }
        GuardError::AlreadyRegistered => StatusCode::CONFLICT,
        GuardError::InvalidEmail(_) | GuardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GuardError::GrantFailed(_) => StatusCode::BAD_GATEWAY,
        GuardError::VerifierUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        GuardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Report<GuardError>> for ApiError {
    fn from(report: Report<GuardError>) -> Self {
        Self(report)
    }
}

impl From<GuardError> for ApiError {
    fn from(error: GuardError) -> Self {
        Self(report!(error))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(report!(GuardError::InvalidRequest(rejection.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0.current_context();
        let status = status_code(error);

        let detail = if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self.0, "Request failed");
            match error {
                GuardError::Internal(_) => "internal server error".to_string(),
                other => other.to_string(),
            }
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, "Request rejected");
            error.to_string()
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}
