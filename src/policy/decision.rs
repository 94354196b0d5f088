//! Allow/deny outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// No or invalid credential where one is required
    NotAuthenticated,
    /// Role does not permit the action category
    InsufficientPrivilege,
    /// Requested scope does not match the principal's house
    HouseMismatch,
    /// Mutation attempted by neither the author nor an admin
    NotOwner,
    /// Appointment hour outside opening hours
    InvalidTimeWindow,
    /// Slot already held by a pending or approved appointment
    SlotConflict,
    /// Status change against the lifecycle (only when transitions are enforced)
    InvalidTransition,
}

impl DenyReason {
    /// Machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "NOT_AUTHENTICATED",
            DenyReason::InsufficientPrivilege => "INSUFFICIENT_PRIVILEGE",
            DenyReason::HouseMismatch => "HOUSE_MISMATCH",
            DenyReason::NotOwner => "NOT_OWNER",
            DenyReason::InvalidTimeWindow => "INVALID_TIME_WINDOW",
            DenyReason::SlotConflict => "SLOT_CONFLICT",
            DenyReason::InvalidTransition => "INVALID_TRANSITION",
        }
    }

    /// Human-readable message
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "Authentication required",
            DenyReason::InsufficientPrivilege => "Your role does not permit this action",
            DenyReason::HouseMismatch => "You can only act within your own house",
            DenyReason::NotOwner => "Only the author or an admin may do this",
            DenyReason::InvalidTimeWindow => "Appointment time must be between 9 AM and 6 PM",
            DenyReason::SlotConflict => {
                "This time slot is already booked. Please choose another time."
            }
            DenyReason::InvalidTransition => "Appointment status cannot move backwards",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a guard: `Ok(())` is allow
pub type Decision = Result<(), DenyReason>;
