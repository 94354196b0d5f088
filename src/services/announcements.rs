//! School-wide and house announcements

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::notifications::NotificationService;
use super::{enforce, max_len, required};
use crate::db::schemas::{
    AnnouncementDoc, AnnouncementType, Metadata, NotificationKind, NotificationPriority, Priority,
    UserDoc, MAX_CONTENT_LEN, MAX_TITLE_LEN,
};
use crate::db::{Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{Action, Policy, Principal, Proposal, ResourceKind, Scope, UserRole};
use crate::types::{GatehouseError, Result};

/// Most announcements returned by one listing
pub const LIST_LIMIT: usize = 50;

/// Body of `POST /api/announcements`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub announcement_type: AnnouncementType,
    /// Defaults to `all`
    #[serde(default, alias = "house")]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Body of `PUT /api/announcements/{id}`; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub announcement_type: Option<AnnouncementType>,
    #[serde(alias = "house")]
    pub scope: Option<Scope>,
    pub priority: Option<Priority>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Query filters for the announcement listing
#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub announcement_type: Option<AnnouncementType>,
    pub priority: Option<Priority>,
}

pub struct AnnouncementService {
    store: Arc<dyn ResourceStore<AnnouncementDoc>>,
    users: Arc<dyn ResourceStore<UserDoc>>,
    notifications: Arc<NotificationService>,
    policy: Policy,
    audit: AuditLogger,
}

impl AnnouncementService {
    pub fn new(
        store: Arc<dyn ResourceStore<AnnouncementDoc>>,
        users: Arc<dyn ResourceStore<UserDoc>>,
        notifications: Arc<NotificationService>,
        policy: Policy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            users,
            notifications,
            policy,
            audit,
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateAnnouncementRequest,
    ) -> Result<AnnouncementDoc> {
        let scope = effective_scope(request.announcement_type, request.scope.unwrap_or(Scope::All));

        let decision = self
            .policy
            .authorize_create(principal, &Proposal::Announcement { scope });
        enforce(
            &self.audit,
            principal,
            ResourceKind::Announcement,
            None,
            "create",
            decision,
        )
        .await?;

        let title = required("Title", &request.title)?;
        max_len("Title", &title, MAX_TITLE_LEN)?;
        let content = required("Content", &request.content)?;
        max_len("Content", &content, MAX_CONTENT_LEN)?;

        let announcement = AnnouncementDoc {
            id: String::new(),
            metadata: Metadata::new(),
            title,
            content,
            announcement_type: request.announcement_type,
            scope,
            priority: request.priority,
            is_public: request.is_public,
            posted_by: principal.user_id().unwrap_or_default().to_string(),
            is_active: true,
            expiry_date: request.expiry_date,
        };
        let announcement = self.store.create(announcement).await?;

        info!(id = %announcement.id, scope = %announcement.scope, "Announcement created");
        self.audit
            .log_mutation(principal, ResourceKind::Announcement, announcement.id(), "create")
            .await;
        self.notify_audience(&announcement).await;

        Ok(announcement)
    }

    /// Current announcements the caller may see, most important first
    pub async fn list(
        &self,
        principal: &Principal,
        filter: AnnouncementFilter,
    ) -> Result<Vec<AnnouncementDoc>> {
        let now = Utc::now();
        let current = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|a| a.is_current(now));

        let mut visible: Vec<AnnouncementDoc> = self
            .policy
            .filter_visible(principal, current)
            .into_iter()
            .filter(|a| {
                filter
                    .announcement_type
                    .map_or(true, |t| a.announcement_type == t)
            })
            .filter(|a| filter.priority.map_or(true, |p| a.priority == p))
            .collect();

        visible.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.metadata.created_at.cmp(&a.metadata.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        visible.truncate(LIST_LIMIT);
        Ok(visible)
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> Result<AnnouncementDoc> {
        let announcement = self.load(id).await?;
        let decision = self.policy.authorize_read(principal, &announcement);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Announcement,
            Some(id),
            "get",
            decision,
        )
        .await?;
        Ok(announcement)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        request: UpdateAnnouncementRequest,
    ) -> Result<AnnouncementDoc> {
        let mut announcement = self.load(id).await?;

        let decision = self
            .policy
            .authorize_mutate(principal, &announcement, Action::Update);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Announcement,
            Some(id),
            "update",
            decision,
        )
        .await?;

        let announcement_type = request
            .announcement_type
            .unwrap_or(announcement.announcement_type);
        let scope = effective_scope(
            announcement_type,
            request.scope.unwrap_or(announcement.scope),
        );
        if scope != announcement.scope {
            let decision = self
                .policy
                .authorize_mutate(principal, &announcement, Action::ChangeScope);
            enforce(
                &self.audit,
                principal,
                ResourceKind::Announcement,
                Some(id),
                "change_scope",
                decision,
            )
            .await?;
        }

        if let Some(title) = request.title {
            let title = required("Title", &title)?;
            max_len("Title", &title, MAX_TITLE_LEN)?;
            announcement.title = title;
        }
        if let Some(content) = request.content {
            let content = required("Content", &content)?;
            max_len("Content", &content, MAX_CONTENT_LEN)?;
            announcement.content = content;
        }
        announcement.announcement_type = announcement_type;
        announcement.scope = scope;
        if let Some(priority) = request.priority {
            announcement.priority = priority;
        }
        if let Some(is_public) = request.is_public {
            announcement.is_public = is_public;
        }
        if let Some(is_active) = request.is_active {
            announcement.is_active = is_active;
        }
        if request.expiry_date.is_some() {
            announcement.expiry_date = request.expiry_date;
        }

        let announcement = self.store.update(announcement).await?;
        self.audit
            .log_mutation(principal, ResourceKind::Announcement, id, "update")
            .await;
        Ok(announcement)
    }

    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let announcement = self.load(id).await?;
        let decision = self
            .policy
            .authorize_mutate(principal, &announcement, Action::Delete);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Announcement,
            Some(id),
            "delete",
            decision,
        )
        .await?;

        if !self.store.delete(id).await? {
            return Err(GatehouseError::NotFound("Announcement not found".into()));
        }
        self.audit
            .log_mutation(principal, ResourceKind::Announcement, id, "delete")
            .await;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<AnnouncementDoc> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("Announcement not found".into()))
    }

    /// Everyone in the announcement's audience except admins and the author
    ///
    /// Best effort: the announcement is already committed when this runs.
    async fn notify_audience(&self, announcement: &AnnouncementDoc) {
        let users = match self.users.list().await {
            Ok(users) => users,
            Err(e) => {
                warn!(
                    id = %announcement.id,
                    error = %e,
                    "Could not look up announcement audience"
                );
                return;
            }
        };
        let recipients: Vec<String> = users
            .into_iter()
            .filter(|u| u.is_active && u.role != UserRole::Admin && u.id != announcement.posted_by)
            .filter(|u| match announcement.scope {
                Scope::All => true,
                Scope::House(house) => u.house == house,
            })
            .map(|u| u.id)
            .collect();

        let priority = match announcement.priority {
            Priority::Low => NotificationPriority::Low,
            Priority::Medium => NotificationPriority::Medium,
            Priority::High | Priority::Urgent => NotificationPriority::High,
        };
        self.notifications
            .notify(
                recipients,
                NotificationKind::Announcement,
                "New Announcement",
                &announcement.title,
                announcement.id(),
                priority,
            )
            .await;
    }
}

/// School-wide announcements always address everyone
fn effective_scope(announcement_type: AnnouncementType, requested: Scope) -> Scope {
    match announcement_type {
        AnnouncementType::SchoolWide => Scope::All,
        _ => requested,
    }
}
