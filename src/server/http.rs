//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one task per connection.

use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Args, StorageBackend};
use crate::db::Stores;
use crate::logging::AuditLogger;
use crate::policy::Policy;
use crate::routes::{self, BoxBody};
use crate::services::Services;
use crate::types::{GatehouseError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Kept for readiness probes; services hold their own handles
    pub stores: Stores,
    pub services: Services,
    pub started_at: Instant,
}

impl AppState {
    /// Wire services over `stores` according to `args`
    pub fn build(args: Args, stores: Stores, audit: AuditLogger) -> Result<Self> {
        let jwt = args.jwt_validator()?;
        let policy = Policy::new(args.policy_config());
        let services = Services::new(
            stores.clone(),
            policy,
            jwt,
            audit,
            args.admin_registration_key.clone(),
        );

        Ok(Self {
            args,
            stores,
            services,
            started_at: Instant::now(),
        })
    }

    pub fn storage_label(&self) -> &'static str {
        match self.args.storage {
            StorageBackend::Memory => "memory",
            StorageBackend::Mongo => "mongo",
        }
    }
}

/// Bind `args.listen` and serve until Ctrl-C
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    serve(listener, state).await
}

/// Serve connections from an already bound listener until Ctrl-C
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let local = listener.local_addr()?;
    info!(
        "Gatehouse listening on {} ({} storage)",
        local,
        state.storage_label()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - built-in JWT secret may be in use");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            debug!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    return Err(GatehouseError::Internal(format!("Signal handler failed: {e}")));
                }
                info!("Shutdown signal received, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    info!(%request_id, "[{}] {} {}", addr, method, path);

    let mut response = route(state, req, &method, &path).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    debug!(
        %request_id,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request complete"
    );
    Ok(response)
}

async fn route(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Response<BoxBody> {
    if method == Method::OPTIONS {
        return routes::cors_preflight();
    }

    match (method, path) {
        (&Method::GET, "/health" | "/healthz") => return routes::health_check(&state),
        (&Method::GET, "/ready" | "/readyz") => return routes::readiness_check(&state).await,
        (&Method::GET, "/version") => return routes::version_info(),
        (_, "/health" | "/healthz" | "/ready" | "/readyz" | "/version") => {
            return routes::method_not_allowed()
        }
        _ => {}
    }

    let handled = match api_section(path) {
        Some("auth") => routes::handle_auth_request(req, state).await,
        Some("appointments") => routes::handle_appointments_request(req, state).await,
        Some("announcements") => routes::handle_announcements_request(req, state).await,
        Some("community") => routes::handle_community_request(req, state).await,
        Some("maps") => routes::handle_maps_request(req, state).await,
        Some("notifications") => routes::handle_notifications_request(req, state).await,
        _ => None,
    };

    handled.unwrap_or_else(|| routes::not_found(path))
}

/// First segment below `/api/`
fn api_section(path: &str) -> Option<&str> {
    path.strip_prefix("/api/")?.split('/').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_section() {
        assert_eq!(api_section("/api/maps/active"), Some("maps"));
        assert_eq!(api_section("/api/auth"), Some("auth"));
        assert_eq!(api_section("/apix/maps"), None);
        assert_eq!(api_section("/health"), None);
    }
}
