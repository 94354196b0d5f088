//! HTTP routes for house community posts
//!
//! - POST   /api/community          - Post to a house board
//! - GET    /api/community          - Visible posts, `?house=` narrows to a house or `school-wide`
//! - GET    /api/community/{id}     - Fetch one
//! - PUT    /api/community/{id}     - Edit
//! - DELETE /api/community/{id}     - Remove
//! - PUT    /api/community/{id}/pin - Toggle pinned

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok, ok_list, ok_message,
    parse_json_body, parse_query_enum, principal, query_params, query_value, segments, BoxBody,
};
use crate::policy::Scope;
use crate::server::AppState;
use crate::services::{CreatePostRequest, UpdatePostRequest};
use crate::types::Result;

/// Route `/api/community/*`; `None` for other paths
pub async fn handle_community_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/community")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, []) => create(req, &state).await,
        (&Method::GET, []) => list(req, &state).await,
        (&Method::GET, [id]) => get(req, &state, id).await,
        (&Method::PUT, [id]) => update(req, &state, id).await,
        (&Method::DELETE, [id]) => delete(req, &state, id).await,
        (&Method::PUT, [id, "pin"]) => toggle_pin(req, &state, id).await,

        (_, [] | [_] | [_, "pin"]) => return Some(method_not_allowed()),
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn create(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: CreatePostRequest = parse_json_body(req).await?;
    let post = state.services.community.create(&principal, body).await?;
    Ok(ok_message(
        StatusCode::CREATED,
        "Post created successfully",
        post,
    ))
}

async fn list(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let params = query_params(&req);
    let scope = query_value(&params, "house")
        .map(|v| parse_query_enum::<Scope>("house", v))
        .transpose()?;

    let posts = state.services.community.list(&principal, scope).await?;
    Ok(ok_list(&posts))
}

async fn get(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let post = state.services.community.get(&principal, id).await?;
    Ok(ok(StatusCode::OK, post))
}

async fn update(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UpdatePostRequest = parse_json_body(req).await?;
    let post = state
        .services
        .community
        .update(&principal, id, body)
        .await?;
    Ok(ok_message(StatusCode::OK, "Post updated successfully", post))
}

async fn delete(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    state.services.community.delete(&principal, id).await?;
    Ok(ok_message(
        StatusCode::OK,
        "Post deleted successfully",
        json!({ "id": id }),
    ))
}

async fn toggle_pin(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let post = state.services.community.toggle_pin(&principal, id).await?;
    let message = if post.is_pinned {
        "Post pinned"
    } else {
        "Post unpinned"
    };
    Ok(ok_message(StatusCode::OK, message, post))
}
