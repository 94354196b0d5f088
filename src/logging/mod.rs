//! Logging infrastructure for Gatehouse
//!
//! Provides a structured audit trail of authorization decisions.

pub mod audit;

pub use audit::{AuditEvent, AuditLogger, EventType};
