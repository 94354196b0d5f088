//! HTTP routes for the notification inbox
//!
//! - GET /api/notifications           - The caller's notifications
//! - PUT /api/notifications/{id}/read - Mark one as read

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok_list, ok_message, principal,
    segments, BoxBody,
};
use crate::server::AppState;
use crate::types::Result;

/// Route `/api/notifications/*`; `None` for other paths
pub async fn handle_notifications_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/notifications")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::GET, []) => list(req, &state).await,
        (&Method::PUT, [id, "read"]) => mark_read(req, &state, id).await,

        (_, [] | [_, "read"]) => return Some(method_not_allowed()),
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn list(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let inbox = state.services.notifications.list_mine(&principal).await?;
    Ok(ok_list(&inbox))
}

async fn mark_read(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let notification = state
        .services
        .notifications
        .mark_read(&principal, id)
        .await?;
    Ok(ok_message(
        StatusCode::OK,
        "Notification marked as read",
        notification,
    ))
}
