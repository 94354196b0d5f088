//! Audit logging for authorization decisions
//!
//! Denials, logins and committed mutations are written as JSONL so an
//! operator can reconstruct who tried what. Every denial is also emitted as
//! a `warn` tracing event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::policy::{DenyReason, Principal, ResourceKind};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A guard refused an operation
    Denied,
    /// A guarded operation was committed
    Mutation,
    /// Login attempt
    AuthAttempt,
    /// Account created
    Registration,
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// `anonymous` or `<role>:<user id>`
    pub principal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Operation name, e.g. `update_status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: EventType, principal: &Principal) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            principal: principal.label(),
            resource_kind: None,
            resource_id: None,
            operation: None,
            reason: None,
            metadata: None,
        }
    }

    pub fn with_resource(mut self, kind: ResourceKind, id: Option<&str>) -> Self {
        self.resource_kind = Some(kind);
        self.resource_id = id.map(str::to_string);
        self
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_reason(mut self, reason: DenyReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that writes events to a JSONL file when configured
#[derive(Clone, Default)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
}

#[derive(Default)]
struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl AuditLogger {
    /// Logger with no file sink; denials still reach tracing
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        inner.path = Some(path.clone());

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Append an event to the file sink
    pub async fn log(&self, event: AuditEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Record a refused operation
    pub async fn log_denied(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Option<&str>,
        operation: &str,
        reason: DenyReason,
    ) {
        warn!(
            principal = %principal.label(),
            resource = %kind,
            resource_id = resource_id.unwrap_or("-"),
            operation,
            reason = reason.code(),
            "Denied"
        );

        let event = AuditEvent::new(EventType::Denied, principal)
            .with_resource(kind, resource_id)
            .with_operation(operation)
            .with_reason(reason);
        self.log(event).await;
    }

    /// Record a committed mutation
    pub async fn log_mutation(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: &str,
        operation: &str,
    ) {
        let event = AuditEvent::new(EventType::Mutation, principal)
            .with_resource(kind, Some(resource_id))
            .with_operation(operation);
        self.log(event).await;
    }

    /// Record a login attempt
    pub async fn log_auth_attempt(&self, success: bool, username: &str) {
        let mut event = AuditEvent::new(EventType::AuthAttempt, &Principal::Anonymous)
            .with_operation("login");
        event.metadata = Some(serde_json::json!({
            "success": success,
            "username": username,
        }));

        if !success {
            warn!(username, "Failed login");
        }

        self.log(event).await;
    }

    /// Record an account registration
    pub async fn log_registration(&self, principal: &Principal, user_id: &str, username: &str) {
        let mut event = AuditEvent::new(EventType::Registration, principal)
            .with_operation("register");
        event.resource_id = Some(user_id.to_string());
        event.metadata = Some(serde_json::json!({ "username": username }));
        self.log(event).await;
    }

    /// Path of the file sink, if any
    pub async fn path(&self) -> Option<PathBuf> {
        self.inner.lock().await.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{House, Role};

    #[test]
    fn test_denial_serialization() {
        let principal = Principal::user("t1", Role::Teacher, House::Red).unwrap();
        let event = AuditEvent::new(EventType::Denied, &principal)
            .with_resource(ResourceKind::Appointment, Some("a1"))
            .with_operation("update_status")
            .with_reason(DenyReason::NotOwner);

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("\"denied\""));
        assert!(jsonl.contains("teacher:t1"));
        assert!(jsonl.contains("\"appointment\""));
        assert!(jsonl.contains("\"not-owner\""));
    }

    #[test]
    fn test_anonymous_label() {
        let event = AuditEvent::new(EventType::AuthAttempt, &Principal::Anonymous);
        assert_eq!(event.principal, "anonymous");
        let jsonl = event.to_jsonl().unwrap();
        assert!(!jsonl.contains("reason"));
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("gatehouse-audit-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let logger = AuditLogger::new();
        logger.init_file(path.clone()).await.unwrap();
        logger
            .log_denied(
                &Principal::Anonymous,
                ResourceKind::Announcement,
                None,
                "create",
                DenyReason::NotAuthenticated,
            )
            .await;
        logger.log_auth_attempt(false, "nobody@kvs").await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(logger.path().await, Some(path.clone()));
        let _ = std::fs::remove_file(&path);
    }
}
