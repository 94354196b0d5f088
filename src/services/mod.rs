//! Services layer for Gatehouse
//!
//! Each operation takes a snapshot from the store, asks the policy engine,
//! and commits only on allow. Denials are audited before they surface.
//!
//! ## Services
//!
//! - **Accounts**: registration, login, password changes, identity resolution
//! - **Appointments**: visitor booking with per-slot serialization
//! - **Announcements**: school-wide and house notices
//! - **Community**: house community posts and pinning
//! - **Maps**: campus maps with a single active instance
//! - **Notifications**: per-user inbox

pub mod accounts;
pub mod announcements;
pub mod appointments;
pub mod community;
pub mod maps;
pub mod notifications;

use std::sync::Arc;

pub use accounts::{AccountService, LoginResponse, RegisterRequest, UserFilter};
pub use announcements::{
    AnnouncementFilter, AnnouncementService, CreateAnnouncementRequest, UpdateAnnouncementRequest,
};
pub use appointments::{
    AppointmentFilter, AppointmentService, BookAppointmentRequest, SlotLocks, UpdateStatusRequest,
};
pub use community::{CommunityService, CreatePostRequest, UpdatePostRequest};
pub use maps::{
    AddMarkerRequest, CampusMapView, MapService, UpdateMapRequest, UploadMapRequest,
};
pub use notifications::NotificationService;

use crate::auth::JwtValidator;
use crate::db::schemas::Metadata;
use crate::db::Stores;
use crate::logging::AuditLogger;
use crate::policy::{Decision, DenyReason, Policy, Principal, ResourceKind};
use crate::types::{GatehouseError, Result};

/// Every service, wired to one set of stores
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub appointments: Arc<AppointmentService>,
    pub announcements: Arc<AnnouncementService>,
    pub community: Arc<CommunityService>,
    pub maps: Arc<MapService>,
    pub notifications: Arc<NotificationService>,
}

impl Services {
    pub fn new(
        stores: Stores,
        policy: Policy,
        jwt: JwtValidator,
        audit: AuditLogger,
        registration_key: Option<String>,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            stores.notifications.clone(),
            policy,
            audit.clone(),
        ));

        Self {
            accounts: Arc::new(AccountService::new(
                stores.users.clone(),
                jwt,
                audit.clone(),
                registration_key,
            )),
            appointments: Arc::new(AppointmentService::new(
                stores.appointments.clone(),
                stores.users.clone(),
                notifications.clone(),
                policy,
                audit.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(
                stores.announcements.clone(),
                stores.users.clone(),
                notifications.clone(),
                policy,
                audit.clone(),
            )),
            community: Arc::new(CommunityService::new(
                stores.community.clone(),
                policy,
                audit.clone(),
            )),
            maps: Arc::new(MapService::new(
                stores.maps.clone(),
                stores.active_map.clone(),
                policy,
                audit,
            )),
            notifications,
        }
    }
}

/// Turn a guard decision into a result, auditing any denial
pub(crate) async fn enforce(
    audit: &AuditLogger,
    principal: &Principal,
    kind: ResourceKind,
    resource_id: Option<&str>,
    operation: &str,
    decision: Decision,
) -> Result<()> {
    match decision {
        Ok(()) => Ok(()),
        Err(reason) => {
            audit
                .log_denied(principal, kind, resource_id, operation, reason)
                .await;
            Err(GatehouseError::Denied(reason))
        }
    }
}

/// Admin-only surface outside the per-resource guards
pub(crate) fn require_admin(principal: &Principal) -> Decision {
    match principal {
        Principal::Anonymous => Err(DenyReason::NotAuthenticated),
        p if p.is_admin() => Ok(()),
        _ => Err(DenyReason::InsufficientPrivilege),
    }
}

/// Any authenticated principal
pub(crate) fn require_user(principal: &Principal) -> Decision {
    if principal.is_anonymous() {
        Err(DenyReason::NotAuthenticated)
    } else {
        Ok(())
    }
}

/// Trimmed, non-empty field
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GatehouseError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Reject values over `max` characters
pub(crate) fn max_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(GatehouseError::BadRequest(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}

/// Trim optional text, treating blank as absent
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Most recently created first
pub(crate) fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (&Metadata, &str)) {
    items.sort_by(|a, b| {
        let (meta_a, id_a) = key(a);
        let (meta_b, id_b) = key(b);
        meta_b
            .created_at
            .cmp(&meta_a.created_at)
            .then_with(|| id_b.cmp(id_a))
    });
}
