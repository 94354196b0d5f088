//! Response envelopes and request helpers shared by every route module

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::auth::Credentials;
use crate::policy::Principal;
use crate::server::AppState;
use crate::types::{GatehouseError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    data: T,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    code: &'a str,
}

/// `{ success: true, data }`
pub fn ok<T: Serialize>(status: StatusCode, data: T) -> Response<BoxBody> {
    json_response(
        status,
        &Envelope {
            success: true,
            message: None,
            count: None,
            data,
        },
    )
}

/// `{ success: true, message, data }`
pub fn ok_message<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response<BoxBody> {
    json_response(
        status,
        &Envelope {
            success: true,
            message: Some(message),
            count: None,
            data,
        },
    )
}

/// `{ success: true, count, data: [...] }`
pub fn ok_list<T: Serialize>(items: &[T]) -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &Envelope {
            success: true,
            message: None,
            count: Some(items.len()),
            data: items,
        },
    )
}

/// Map an error to its status and JSON body
pub fn error_response(err: &GatehouseError) -> Response<BoxBody> {
    let status = err.status_code();
    let message = match err {
        GatehouseError::BadRequest(m)
        | GatehouseError::Unauthorized(m)
        | GatehouseError::Forbidden(m)
        | GatehouseError::NotFound(m)
        | GatehouseError::Conflict(m) => m.clone(),
        GatehouseError::Denied(reason) => reason.message().to_string(),
        // Internals stay in the logs
        GatehouseError::Database(_)
        | GatehouseError::Internal(_)
        | GatehouseError::Config(_) => "Server error".to_string(),
        GatehouseError::Http(m) | GatehouseError::Auth(m) => m.clone(),
    };

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    } else {
        debug!(status = status.as_u16(), error = %err, "Request rejected");
    }

    json_response(
        status,
        &ErrorBody {
            success: false,
            error: &message,
            code: err.code(),
        },
    )
}

pub fn not_found(path: &str) -> Response<BoxBody> {
    error_response(&GatehouseError::NotFound(format!("Route {path} not found")))
}

pub fn method_not_allowed() -> Response<BoxBody> {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorBody {
            success: false,
            error: "Method not allowed",
            code: "METHOD_NOT_ALLOWED",
        },
    );
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    with_cors(response)
}

pub fn cors_preflight() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    with_cors(response)
}

fn with_cors(mut response: Response<BoxBody>) -> Response<BoxBody> {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and decode a JSON body of at most [`MAX_BODY_BYTES`]
pub async fn parse_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                GatehouseError::BadRequest("Request body too large".into())
            } else {
                GatehouseError::Http(format!("Failed to read body: {e}"))
            }
        })?;

    serde_json::from_slice(&body.to_bytes())
        .map_err(|e| GatehouseError::BadRequest(format!("Invalid JSON: {e}")))
}

/// Decoded query string
pub fn query_params<B>(req: &Request<B>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (decode(key), decode(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Parse a query value as a wire-format enum (`"pending"`, `"vice-principal"`)
pub fn parse_query_enum<T: DeserializeOwned>(field: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| GatehouseError::BadRequest(format!("Invalid {field} '{value}'")))
}

/// Optional query value, blank treated as absent
pub fn query_value<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Credential headers copied off a request
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    authorization: Option<String>,
    cookie: Option<String>,
}

pub fn credentials<B>(req: &Request<B>) -> RequestCredentials {
    let header_str = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RequestCredentials {
        authorization: header_str(header::AUTHORIZATION),
        cookie: header_str(header::COOKIE),
    }
}

/// The principal behind a request
pub async fn principal(state: &AppState, credentials: RequestCredentials) -> Result<Principal> {
    state
        .services
        .accounts
        .authenticate(Credentials {
            authorization: credentials.authorization.as_deref(),
            cookie: credentials.cookie.as_deref(),
        })
        .await
}

/// Path below `prefix`, split on `/`; `None` when `path` is not under it
pub fn segments<'a>(path: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let rest = path.strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(rest.split('/').filter(|s| !s.is_empty()).collect())
}
