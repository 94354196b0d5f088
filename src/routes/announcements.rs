//! HTTP routes for announcements
//!
//! - POST   /api/announcements      - Create (teachers and admins)
//! - GET    /api/announcements      - Current announcements the caller may see
//! - GET    /api/announcements/{id} - Fetch one
//! - PUT    /api/announcements/{id} - Edit
//! - DELETE /api/announcements/{id} - Remove

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok, ok_list, ok_message,
    parse_json_body, parse_query_enum, principal, query_params, query_value, segments, BoxBody,
};
use crate::server::AppState;
use crate::services::{AnnouncementFilter, CreateAnnouncementRequest, UpdateAnnouncementRequest};
use crate::types::Result;

/// Route `/api/announcements/*`; `None` for other paths
pub async fn handle_announcements_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/announcements")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, []) => create(req, &state).await,
        (&Method::GET, []) => list(req, &state).await,
        (&Method::GET, [id]) => get(req, &state, id).await,
        (&Method::PUT, [id]) => update(req, &state, id).await,
        (&Method::DELETE, [id]) => delete(req, &state, id).await,

        (_, [] | [_]) => return Some(method_not_allowed()),
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn create(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: CreateAnnouncementRequest = parse_json_body(req).await?;
    let announcement = state
        .services
        .announcements
        .create(&principal, body)
        .await?;
    Ok(ok_message(
        StatusCode::CREATED,
        "Announcement created successfully",
        announcement,
    ))
}

async fn list(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let params = query_params(&req);
    let filter = AnnouncementFilter {
        announcement_type: query_value(&params, "type")
            .map(|v| parse_query_enum("type", v))
            .transpose()?,
        priority: query_value(&params, "priority")
            .map(|v| parse_query_enum("priority", v))
            .transpose()?,
    };

    let announcements = state
        .services
        .announcements
        .list(&principal, filter)
        .await?;
    Ok(ok_list(&announcements))
}

async fn get(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let announcement = state.services.announcements.get(&principal, id).await?;
    Ok(ok(StatusCode::OK, announcement))
}

async fn update(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UpdateAnnouncementRequest = parse_json_body(req).await?;
    let announcement = state
        .services
        .announcements
        .update(&principal, id, body)
        .await?;
    Ok(ok_message(
        StatusCode::OK,
        "Announcement updated successfully",
        announcement,
    ))
}

async fn delete(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    state.services.announcements.delete(&principal, id).await?;
    Ok(ok_message(
        StatusCode::OK,
        "Announcement deleted successfully",
        json!({ "id": id }),
    ))
}
