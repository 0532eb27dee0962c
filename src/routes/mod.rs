pub mod outbox;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use caldir_schedule_core::RequestError;

/// Errors the handlers turn into plain-text HTTP responses.
pub enum AppError {
    /// No authenticated user in the request
    Unauthenticated,
    /// The request was rejected before any attendee was processed
    Rejected(RequestError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Authentication required").into_response()
            }
            AppError::Rejected(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(error = %err, "Scheduling request failed");
                } else {
                    tracing::debug!(error = %err, "Scheduling request rejected");
                }
                (status, err.to_string()).into_response()
            }
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Rejected(err)
    }
}
