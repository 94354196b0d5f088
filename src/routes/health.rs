//! Health check endpoints
//!
//! - /health, /healthz - Liveness (the process is serving)
//! - /ready, /readyz   - Readiness (the storage backend answers)
//! - /version          - Build information

use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use super::common::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// `online` or `degraded`
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    /// Storage backend in use
    pub storage: &'static str,
    pub mode: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(state: &AppState, storage_error: Option<String>) -> HealthResponse {
    HealthResponse {
        healthy: storage_error.is_none(),
        status: if storage_error.is_none() {
            "online"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        storage: state.storage_label(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        error: storage_error,
    }
}

/// Liveness probe; always 200 while the process is up
pub fn health_check(state: &AppState) -> Response<BoxBody> {
    json_response(StatusCode::OK, &build_health_response(state, None))
}

/// Readiness probe; 503 when the storage backend cannot be reached
pub async fn readiness_check(state: &AppState) -> Response<BoxBody> {
    let storage_error = match state.stores.active_map.get().await {
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Readiness probe failed");
            Some(format!("Storage unavailable: {e}"))
        }
    };

    let status = if storage_error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &build_health_response(state, storage_error))
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    /// Built from a tree with uncommitted changes
    pub dirty: bool,
    pub service: &'static str,
}

pub fn version_info() -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GATEHOUSE_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GATEHOUSE_COMMIT").unwrap_or("unknown"),
        build_time: option_env!("GATEHOUSE_BUILT_AT").unwrap_or("unknown"),
        dirty: option_env!("GATEHOUSE_DIRTY") == Some("true"),
        service: env!("CARGO_PKG_NAME"),
    };
    json_response(StatusCode::OK, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::db::Stores;
    use crate::logging::AuditLogger;
    use clap::Parser;
    use http_body_util::BodyExt;

    fn state() -> AppState {
        let args = Args::parse_from(["gatehouse", "--dev-mode"]);
        AppState::build(args, Stores::memory(), AuditLogger::new()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_memory_backend() {
        let response = health_check(&state());
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["healthy"], true);
        assert_eq!(json["storage"], "memory");
        assert_eq!(json["mode"], "development");
    }

    #[tokio::test]
    async fn test_version_carries_build_stamps() {
        let body = version_info().into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["service"], "gatehouse");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["dirty"].is_boolean());
        assert!(!json["build_time"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ready_with_memory_store() {
        assert_eq!(readiness_check(&state()).await.status(), StatusCode::OK);
    }
}
