//! HTTP routes for accounts
//!
//! - POST /api/auth/register        - Create an account (admin key required)
//! - POST /api/auth/login           - Authenticate and get a JWT
//! - GET  /api/auth/me              - Current account
//! - GET  /api/auth/users           - Admin account listing
//! - PUT  /api/auth/update-password - Change password, returns a fresh JWT

use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok, ok_list, ok_message,
    parse_json_body, parse_query_enum, principal, query_params, query_value, segments, BoxBody,
};
use crate::auth::AUTH_COOKIE;
use crate::policy::House;
use crate::server::AppState;
use crate::services::{RegisterRequest, UserFilter};
use crate::types::{GatehouseError, Result};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

/// Route `/api/auth/*`; `None` for other paths
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/auth")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, ["register"]) => handle_register(req, &state).await,
        (&Method::POST, ["login"]) => handle_login(req, &state).await,
        (&Method::GET, ["me"]) => handle_me(req, &state).await,
        (&Method::GET, ["users"]) => handle_list_users(req, &state).await,
        (&Method::PUT, ["update-password"]) => handle_update_password(req, &state).await,

        (_, ["register" | "login" | "me" | "users" | "update-password"]) => {
            return Some(method_not_allowed())
        }
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn handle_register(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: RegisterRequest = parse_json_body(req).await?;
    let user = state.services.accounts.register(&principal, body).await?;
    Ok(ok_message(
        StatusCode::CREATED,
        "User registered successfully",
        user,
    ))
}

async fn handle_login(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let body: LoginRequest = parse_json_body(req).await?;
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(GatehouseError::BadRequest(
            "Username and password are required".into(),
        ));
    }

    let login = state
        .services
        .accounts
        .login(&body.username, &body.password)
        .await?;
    info!(username = %login.user.username, role = %login.user.role, "User logged in");

    let cookie = format!(
        "{AUTH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        login.token,
        state.args.jwt_expiry_seconds
    );
    let mut response = ok_message(StatusCode::OK, "Login successful", login);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

async fn handle_me(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let user = state.services.accounts.me(&principal).await?;
    Ok(ok(StatusCode::OK, user))
}

async fn handle_list_users(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let params = query_params(&req);

    let filter = UserFilter {
        role: query_value(&params, "role")
            .map(|v| parse_query_enum("role", v))
            .transpose()?,
        house: query_value(&params, "house")
            .map(|v| parse_query_enum::<House>("house", v))
            .transpose()?,
        search: query_value(&params, "search").map(str::to_string),
    };

    let users = state.services.accounts.list_users(&principal, filter).await?;
    Ok(ok_list(&users))
}

async fn handle_update_password(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UpdatePasswordRequest = parse_json_body(req).await?;
    let token = state
        .services
        .accounts
        .update_password(&principal, &body.current_password, &body.new_password)
        .await?;
    Ok(ok_message(
        StatusCode::OK,
        "Password updated successfully",
        TokenResponse { token },
    ))
}
