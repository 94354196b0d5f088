//! HTTP route handlers
//!
//! Each resource module claims one `/api/<section>` prefix and returns
//! `None` for paths outside it.

pub mod announcements;
pub mod appointments;
pub mod auth_routes;
pub mod common;
pub mod community;
pub mod health;
pub mod maps;
pub mod notifications;

pub use announcements::handle_announcements_request;
pub use appointments::handle_appointments_request;
pub use auth_routes::handle_auth_request;
pub use common::{
    cors_preflight, error_response, method_not_allowed, not_found, BoxBody, MAX_BODY_BYTES,
};
pub use community::handle_community_request;
pub use health::{health_check, readiness_check, version_info};
pub use maps::handle_maps_request;
pub use notifications::handle_notifications_request;
