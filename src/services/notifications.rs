//! Per-user notification inbox

use std::sync::Arc;
use tracing::{debug, warn};

use super::{enforce, newest_first, require_user};
use crate::db::schemas::{NotificationDoc, NotificationKind, NotificationPriority};
use crate::db::{Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{Action, Policy, Principal, ResourceKind};
use crate::types::{GatehouseError, Result};

pub struct NotificationService {
    store: Arc<dyn ResourceStore<NotificationDoc>>,
    policy: Policy,
    audit: AuditLogger,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn ResourceStore<NotificationDoc>>,
        policy: Policy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            policy,
            audit,
        }
    }

    /// Drop one notification in each recipient's inbox
    ///
    /// Delivery is best effort: a failed insert is logged and skipped.
    pub async fn notify<I>(
        &self,
        recipients: I,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_id: &str,
        priority: NotificationPriority,
    ) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut delivered = 0;
        for recipient in recipients {
            let doc = NotificationDoc::new(
                recipient.as_str(),
                kind,
                title,
                message,
                related_id,
                priority,
            );
            match self.store.create(doc).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(recipient = %recipient, error = %e, "Failed to deliver notification"),
            }
        }
        debug!(delivered, related_id, "Notifications delivered");
        delivered
    }

    /// The caller's own notifications, newest first
    pub async fn list_mine(&self, principal: &Principal) -> Result<Vec<NotificationDoc>> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::Notification,
            None,
            "list",
            require_user(principal),
        )
        .await?;

        let user_id = principal.user_id().unwrap_or_default();
        let inbox = self.store.find_by("recipient", user_id).await?;
        let mut visible = self.policy.filter_visible(principal, inbox);
        newest_first(&mut visible, |n| (&n.metadata, n.id()));
        Ok(visible)
    }

    /// Mark one of the caller's notifications as read
    pub async fn mark_read(&self, principal: &Principal, id: &str) -> Result<NotificationDoc> {
        let mut notification = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("Notification not found".into()))?;

        let decision = self
            .policy
            .authorize_mutate(principal, &notification, Action::Update);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Notification,
            Some(id),
            "mark_read",
            decision,
        )
        .await?;

        if notification.is_read {
            return Ok(notification);
        }
        notification.is_read = true;
        self.store.update(notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::policy::{DenyReason, House, Role};

    const S1: &str = "652f1c0e9b1e8a0000000001";
    const S2: &str = "652f1c0e9b1e8a0000000002";

    fn service() -> NotificationService {
        NotificationService::new(
            Arc::new(MemoryStore::new()),
            Policy::default(),
            AuditLogger::new(),
        )
    }

    fn student(id: &str) -> Principal {
        Principal::user(id, Role::Student, House::Blue).unwrap()
    }

    #[tokio::test]
    async fn test_inbox_is_private() {
        let service = service();
        let delivered = service
            .notify(
                vec![S1.to_string(), S2.to_string()],
                NotificationKind::Announcement,
                "New Announcement",
                "Sports day",
                "ann-1",
                NotificationPriority::Medium,
            )
            .await;
        assert_eq!(delivered, 2);

        let mine = service.list_mine(&student(S1)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].recipient, S1);

        let err = service.list_mine(&Principal::Anonymous).await.unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_mark_read_owner_only() {
        let service = service();
        service
            .notify(
                vec![S1.to_string()],
                NotificationKind::Appointment,
                "New Appointment Request",
                "Visitor at 10:00",
                "appt-1",
                NotificationPriority::High,
            )
            .await;
        let id = service.list_mine(&student(S1)).await.unwrap()[0].id.clone();

        let err = service.mark_read(&student(S2), &id).await.unwrap_err();
        assert!(matches!(err, GatehouseError::Denied(DenyReason::NotOwner)));

        let read = service.mark_read(&student(S1), &id).await.unwrap();
        assert!(read.is_read);

        let err = service.mark_read(&student(S1), "missing").await.unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));
    }
}
