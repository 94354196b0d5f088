//! HTTP routes for campus maps
//!
//! - GET    /api/maps/active                - The active map (public)
//! - POST   /api/maps                       - Upload (admin)
//! - GET    /api/maps                       - All maps (admin)
//! - PUT    /api/maps/{id}                  - Edit (admin)
//! - DELETE /api/maps/{id}                  - Remove an inactive map (admin)
//! - PUT    /api/maps/{id}/activate         - Make this the active map (admin)
//! - POST   /api/maps/{id}/markers          - Add a marker (admin)
//! - DELETE /api/maps/{id}/markers/{marker} - Remove a marker (admin)

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok, ok_list, ok_message,
    parse_json_body, principal, segments, BoxBody,
};
use crate::server::AppState;
use crate::services::{AddMarkerRequest, UpdateMapRequest, UploadMapRequest};
use crate::types::Result;

/// Route `/api/maps/*`; `None` for other paths
pub async fn handle_maps_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/maps")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        // Literal segment first so "active" never reads as an id
        (&Method::GET, ["active"]) => active(&state).await,
        (_, ["active"]) => return Some(method_not_allowed()),

        (&Method::POST, []) => upload(req, &state).await,
        (&Method::GET, []) => list(req, &state).await,
        (&Method::PUT, [id]) => update(req, &state, id).await,
        (&Method::DELETE, [id]) => delete(req, &state, id).await,
        (&Method::PUT, [id, "activate"]) => activate(req, &state, id).await,
        (&Method::POST, [id, "markers"]) => add_marker(req, &state, id).await,
        (&Method::DELETE, [id, "markers", marker_id]) => {
            delete_marker(req, &state, id, marker_id).await
        }

        (_, [] | [_] | [_, "activate"] | [_, "markers"] | [_, "markers", _]) => {
            return Some(method_not_allowed())
        }
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn active(state: &AppState) -> Result<Response<BoxBody>> {
    let map = state.services.maps.active().await?;
    Ok(ok(StatusCode::OK, map))
}

async fn upload(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UploadMapRequest = parse_json_body(req).await?;
    let map = state.services.maps.upload(&principal, body).await?;
    Ok(ok_message(
        StatusCode::CREATED,
        "Map uploaded successfully",
        map,
    ))
}

async fn list(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let maps = state.services.maps.list(&principal).await?;
    Ok(ok_list(&maps))
}

async fn update(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UpdateMapRequest = parse_json_body(req).await?;
    let map = state.services.maps.update(&principal, id, body).await?;
    Ok(ok_message(StatusCode::OK, "Map updated successfully", map))
}

async fn delete(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    state.services.maps.delete(&principal, id).await?;
    Ok(ok_message(
        StatusCode::OK,
        "Map deleted successfully",
        json!({ "id": id }),
    ))
}

async fn activate(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let map = state.services.maps.activate(&principal, id).await?;
    Ok(ok_message(StatusCode::OK, "Map activated successfully", map))
}

async fn add_marker(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: AddMarkerRequest = parse_json_body(req).await?;
    let map = state.services.maps.add_marker(&principal, id, body).await?;
    Ok(ok_message(StatusCode::CREATED, "Marker added successfully", map))
}

async fn delete_marker(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
    marker_id: &str,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let map = state
        .services
        .maps
        .delete_marker(&principal, id, marker_id)
        .await?;
    Ok(ok_message(StatusCode::OK, "Marker deleted successfully", map))
}
