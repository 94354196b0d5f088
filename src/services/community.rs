//! House community posts
//!
//! Edits are read-modify-write of the whole post, so they are serialized:
//! a pin toggle never races an update or another toggle.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::{enforce, max_len, require_user, required};
use crate::db::schemas::{CommunityPostDoc, Metadata, MAX_POST_CONTENT_LEN, MAX_POST_TITLE_LEN};
use crate::db::{Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{
    Action, DenyReason, Policy, Principal, Proposal, ResourceKind, Role, Scope,
};
use crate::types::{GatehouseError, Result};

/// Most posts returned by one listing
pub const LIST_LIMIT: usize = 100;

/// Body of `POST /api/community`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    /// Defaults to the author's own house
    #[serde(default, alias = "house")]
    pub scope: Option<Scope>,
}

/// Body of `PUT /api/community/{id}`; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "house")]
    pub scope: Option<Scope>,
    pub is_active: Option<bool>,
}

pub struct CommunityService {
    store: Arc<dyn ResourceStore<CommunityPostDoc>>,
    policy: Policy,
    audit: AuditLogger,
    writes: Mutex<()>,
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn ResourceStore<CommunityPostDoc>>,
        policy: Policy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            policy,
            audit,
            writes: Mutex::new(()),
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        request: CreatePostRequest,
    ) -> Result<CommunityPostDoc> {
        let scope = match (request.scope, principal.house()) {
            (Some(scope), _) => scope,
            (None, Some(house)) if house.is_assigned() => Scope::House(house),
            (None, _) => Scope::All,
        };

        let decision = self
            .policy
            .authorize_create(principal, &Proposal::CommunityPost { scope });
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            None,
            "create",
            decision,
        )
        .await?;

        let title = required("Title", &request.title)?;
        max_len("Title", &title, MAX_POST_TITLE_LEN)?;
        let content = required("Content", &request.content)?;
        max_len("Content", &content, MAX_POST_CONTENT_LEN)?;

        let post = CommunityPostDoc {
            id: String::new(),
            metadata: Metadata::new(),
            title,
            content,
            scope,
            posted_by: principal.user_id().unwrap_or_default().to_string(),
            is_active: true,
            is_pinned: false,
        };
        let post = self.store.create(post).await?;

        info!(id = %post.id, scope = %post.scope, "Community post created");
        self.audit
            .log_mutation(principal, ResourceKind::CommunityPost, post.id(), "create")
            .await;
        Ok(post)
    }

    /// Active posts the caller may see, pinned first then newest
    ///
    /// `scope` narrows the listing to school-wide posts or one house's posts.
    pub async fn list(
        &self,
        principal: &Principal,
        scope: Option<Scope>,
    ) -> Result<Vec<CommunityPostDoc>> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            None,
            "list",
            require_user(principal),
        )
        .await?;

        if let Some(Scope::House(requested)) = scope {
            let foreign = match principal.role() {
                Some(Role::Admin) => false,
                _ => principal.house() != Some(requested),
            };
            if foreign {
                enforce(
                    &self.audit,
                    principal,
                    ResourceKind::CommunityPost,
                    None,
                    "list",
                    Err(DenyReason::HouseMismatch),
                )
                .await?;
            }
        }

        let active = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .filter(|p| scope.map_or(true, |requested| p.scope == requested));

        let mut visible = self.policy.filter_visible(principal, active);
        visible.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.metadata.created_at.cmp(&a.metadata.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        visible.truncate(LIST_LIMIT);
        Ok(visible)
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> Result<CommunityPostDoc> {
        let post = self.load(id).await?;
        let decision = self.policy.authorize_read(principal, &post);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            Some(id),
            "get",
            decision,
        )
        .await?;
        Ok(post)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        request: UpdatePostRequest,
    ) -> Result<CommunityPostDoc> {
        let _writes = self.writes.lock().await;
        let mut post = self.load(id).await?;

        let decision = self.policy.authorize_mutate(principal, &post, Action::Update);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            Some(id),
            "update",
            decision,
        )
        .await?;

        if let Some(scope) = request.scope.filter(|s| *s != post.scope) {
            let decision = self
                .policy
                .authorize_mutate(principal, &post, Action::ChangeScope);
            enforce(
                &self.audit,
                principal,
                ResourceKind::CommunityPost,
                Some(id),
                "change_scope",
                decision,
            )
            .await?;
            post.scope = scope;
        }

        if let Some(title) = request.title {
            let title = required("Title", &title)?;
            max_len("Title", &title, MAX_POST_TITLE_LEN)?;
            post.title = title;
        }
        if let Some(content) = request.content {
            let content = required("Content", &content)?;
            max_len("Content", &content, MAX_POST_CONTENT_LEN)?;
            post.content = content;
        }
        if let Some(is_active) = request.is_active {
            post.is_active = is_active;
        }

        let post = self.store.update(post).await?;
        self.audit
            .log_mutation(principal, ResourceKind::CommunityPost, id, "update")
            .await;
        Ok(post)
    }

    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let _writes = self.writes.lock().await;
        let post = self.load(id).await?;
        let decision = self.policy.authorize_mutate(principal, &post, Action::Delete);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            Some(id),
            "delete",
            decision,
        )
        .await?;

        if !self.store.delete(id).await? {
            return Err(GatehouseError::NotFound("Post not found".into()));
        }
        self.audit
            .log_mutation(principal, ResourceKind::CommunityPost, id, "delete")
            .await;
        Ok(())
    }

    /// Flip the pinned flag
    pub async fn toggle_pin(&self, principal: &Principal, id: &str) -> Result<CommunityPostDoc> {
        let _writes = self.writes.lock().await;
        let mut post = self.load(id).await?;
        let decision = self
            .policy
            .authorize_mutate(principal, &post, Action::PinToggle);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CommunityPost,
            Some(id),
            "toggle_pin",
            decision,
        )
        .await?;

        post.is_pinned = !post.is_pinned;
        let post = self.store.update(post).await?;
        info!(id, pinned = post.is_pinned, "Community post pin toggled");
        self.audit
            .log_mutation(principal, ResourceKind::CommunityPost, id, "toggle_pin")
            .await;
        Ok(post)
    }

    async fn load(&self, id: &str) -> Result<CommunityPostDoc> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("Post not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::policy::House;

    fn service() -> CommunityService {
        CommunityService::new(
            Arc::new(MemoryStore::new()),
            Policy::default(),
            AuditLogger::new(),
        )
    }

    fn user(id: &str, role: Role, house: House) -> Principal {
        Principal::user(id, role, house).unwrap()
    }

    fn post(title: &str, scope: Option<Scope>) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            content: "See you at the field".into(),
            scope,
        }
    }

    #[tokio::test]
    async fn test_student_posts_default_to_own_house() {
        let service = service();
        let captain = user("s1", Role::Student, House::Yellow);
        let created = service.create(&captain, post("Practice", None)).await.unwrap();
        assert_eq!(created.scope, Scope::House(House::Yellow));

        let err = service
            .create(&captain, post("Raid", Some(Scope::House(House::Green))))
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Denied(DenyReason::HouseMismatch)));

        let err = service
            .create(&Principal::Anonymous, post("Spam", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_list_house_scoping() {
        let service = service();
        let admin = user("a1", Role::Admin, House::None);
        service
            .create(&admin, post("Everyone", Some(Scope::All)))
            .await
            .unwrap();
        service
            .create(&user("s1", Role::Student, House::Red), post("Red", None))
            .await
            .unwrap();
        service
            .create(&user("s2", Role::Student, House::Blue), post("Blue", None))
            .await
            .unwrap();

        let red_teacher = user("t1", Role::Teacher, House::Red);
        let listed = service.list(&red_teacher, None).await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"Everyone") && titles.contains(&"Red"));

        let own = service.list(&red_teacher, Some(Scope::House(House::Red))).await.unwrap();
        assert_eq!(own.len(), 1);

        let err = service
            .list(&red_teacher, Some(Scope::House(House::Blue)))
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Denied(DenyReason::HouseMismatch)));

        assert_eq!(
            service
                .list(&admin, Some(Scope::House(House::Blue)))
                .await
                .unwrap()
                .len(),
            1
        );

        let school_wide = service.list(&red_teacher, Some(Scope::All)).await.unwrap();
        assert_eq!(school_wide.len(), 1);
        assert_eq!(school_wide[0].title, "Everyone");
        assert!(service.list(&Principal::Anonymous, None).await.is_err());
    }

    #[tokio::test]
    async fn test_pinned_first() {
        let service = service();
        let student = user("s1", Role::Student, House::Green);
        let first = service.create(&student, post("First", None)).await.unwrap();
        service.create(&student, post("Second", None)).await.unwrap();

        let teacher = user("t1", Role::Teacher, House::Green);
        let pinned = service.toggle_pin(&teacher, &first.id).await.unwrap();
        assert!(pinned.is_pinned);

        let listed = service.list(&student, None).await.unwrap();
        assert_eq!(listed[0].title, "First");

        let err = service.toggle_pin(&student, &first.id).await.unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::InsufficientPrivilege)
        ));
    }

    #[tokio::test]
    async fn test_author_edits_and_deletes() {
        let service = service();
        let author = user("s1", Role::Student, House::Red);
        let created = service.create(&author, post("Draft", None)).await.unwrap();

        let err = service
            .update(
                &user("s2", Role::Student, House::Red),
                &created.id,
                UpdatePostRequest {
                    title: Some("Mine now".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Denied(DenyReason::NotOwner)));

        let updated = service
            .update(
                &author,
                &created.id,
                UpdatePostRequest {
                    title: Some("Final".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");

        service.delete(&author, &created.id).await.unwrap();
        assert!(matches!(
            service.delete(&author, &created.id).await,
            Err(GatehouseError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pin_toggles_all_apply() {
        let service = Arc::new(service());
        let student = user("s1", Role::Student, House::Yellow);
        let created = service.create(&student, post("Sports day", None)).await.unwrap();
        let teacher = user("t1", Role::Teacher, House::Yellow);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let service = Arc::clone(&service);
                let teacher = teacher.clone();
                let id = created.id.clone();
                tokio::spawn(async move { service.toggle_pin(&teacher, &id).await })
            })
            .collect();

        let mut pinned = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_pinned {
                pinned += 1;
            }
        }

        // Toggles alternate, so half of them saw the post become pinned
        assert_eq!(pinned, 8);
        assert!(!service.get(&student, &created.id).await.unwrap().is_pinned);
    }
}
