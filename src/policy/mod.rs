//! Visibility and authorization engine
//!
//! One rules engine decides, for every resource kind the school exposes:
//!
//! - **Read**: which resources a principal may see ([`Policy::filter_visible`])
//! - **Create**: whether a principal may create a resource with the requested
//!   scope ([`Policy::authorize_create`])
//! - **Mutate**: whether a principal may update, delete, pin or activate an
//!   existing resource ([`Policy::authorize_mutate`])
//!
//! Every decision is a pure function of the principal and the resource
//! snapshot handed in. The engine takes no locks and does no I/O; callers
//! commit the outcome atomically with their own state change.

mod create;
mod decision;
mod mutate;
mod principal;
mod resource;
mod visibility;

pub use create::{Proposal, OPENING_HOUR, CLOSING_HOUR};
pub use decision::{Decision, DenyReason};
pub use mutate::Action;
pub use principal::{House, Identity, Principal, Role, UserId, UserRole};
pub use resource::{
    AppointmentStatus, AppointmentWith, Audience, Booking, Guarded, ResourceKind, Scope, Slot,
};

/// Input the engine cannot reason about
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("malformed principal: {0}")]
    MalformedPrincipal(String),

    #[error("malformed resource: {0}")]
    MalformedResource(String),
}

/// Optional tightening of the default rules
///
/// Both are off unless configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Hide principal/vice-principal appointments from teachers
    pub restrict_office_appointments: bool,
    /// Reject status changes outside `pending -> approved | rejected -> completed`
    pub enforce_status_transitions: bool,
}

/// The rules engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    config: PolicyConfig,
}

impl Policy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}
