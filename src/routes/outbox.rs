//! Scheduling outbox endpoint

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use caldir_schedule_core::request::is_calendar_media_type;
use caldir_schedule_core::{OutboxPost, PrincipalRef, RequestError};
use tokio_util::sync::CancellationToken;

use crate::routes::AppError;
use crate::state::AppState;

/// Set by the authenticating reverse proxy in front of the server.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

pub fn router() -> Router<AppState> {
    Router::new().route("/calendars/{user}/{resource}", post(schedule))
}

/// POST /calendars/:user/:resource - Free/busy request to a scheduling outbox
async fn schedule(
    State(state): State<AppState>,
    Path((user, resource)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let requester = headers
        .get(REMOTE_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|name| PrincipalRef::new(format!("principals/{name}")))
        .ok_or(AppError::Unauthenticated)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // Other handlers may own non-calendar POSTs, whatever their body holds
    if !is_calendar_media_type(content_type) {
        tracing::debug!(content_type, "Declining non-calendar POST");
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let body = std::str::from_utf8(&body).map_err(|_| {
        RequestError::MalformedRequest("Request body is not valid UTF-8".to_string())
    })?;
    let path = format!("calendars/{user}/{resource}");

    // Dropping this handler (client went away) cancels outstanding attendee work
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let post = OutboxPost {
        path: &path,
        content_type,
        body,
        requester: &requester,
    };

    match state.dispatcher.handle_post(&post, cancel).await? {
        Some(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
            Ok((status, [(header::CONTENT_TYPE, response.content_type)], response.body).into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
