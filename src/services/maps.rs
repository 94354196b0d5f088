//! Campus maps
//!
//! At most one map is active. Which one is decided by a single pointer
//! write, so a reader always sees exactly one active map once any map has
//! been activated. Map writes (activation, deletion, marker edits) are
//! serialized so a map cannot be deleted while it is being activated.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::{enforce, optional, require_admin, required};
use crate::db::schemas::{
    CampusMapDoc, FileFormat, Marker, MarkerType, Metadata, Vec3, ViewSettings,
};
use crate::db::{new_id, ActivePointer, Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{Action, Policy, Principal, Proposal, ResourceKind};
use crate::types::{GatehouseError, Result};

/// Body of `POST /api/maps`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMapRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub model_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_format: FileFormat,
    #[serde(rename = "metadata", default)]
    pub view: ViewSettings,
    #[serde(default)]
    pub markers: Vec<AddMarkerRequest>,
}

/// Body of `PUT /api/maps/{id}`; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMapRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(rename = "metadata")]
    pub view: Option<ViewSettings>,
}

/// Body of `POST /api/maps/{id}/markers`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarkerRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: Vec3,
    #[serde(rename = "type", default)]
    pub marker_type: MarkerType,
}

impl AddMarkerRequest {
    fn into_marker(self) -> Result<Marker> {
        Ok(Marker {
            id: new_id(),
            name: required("Marker name", &self.name)?,
            description: optional(self.description),
            position: self.position,
            marker_type: self.marker_type,
        })
    }
}

/// A map together with whether it is the active one
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampusMapView {
    #[serde(flatten)]
    pub map: CampusMapDoc,
    pub is_active: bool,
}

pub struct MapService {
    store: Arc<dyn ResourceStore<CampusMapDoc>>,
    active: Arc<dyn ActivePointer>,
    policy: Policy,
    audit: AuditLogger,
    writes: Mutex<()>,
}

impl MapService {
    pub fn new(
        store: Arc<dyn ResourceStore<CampusMapDoc>>,
        active: Arc<dyn ActivePointer>,
        policy: Policy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            active,
            policy,
            audit,
            writes: Mutex::new(()),
        }
    }

    /// Register a new map; it starts inactive
    pub async fn upload(
        &self,
        principal: &Principal,
        request: UploadMapRequest,
    ) -> Result<CampusMapView> {
        let decision = self.policy.authorize_create(principal, &Proposal::CampusMap);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CampusMap,
            None,
            "upload",
            decision,
        )
        .await?;

        let markers = request
            .markers
            .into_iter()
            .map(AddMarkerRequest::into_marker)
            .collect::<Result<Vec<_>>>()?;

        let map = CampusMapDoc {
            id: String::new(),
            metadata: Metadata::new(),
            name: required("Name", &request.name)?,
            description: optional(request.description),
            model_url: required("Model URL", &request.model_url)?,
            thumbnail_url: optional(request.thumbnail_url),
            file_size: request.file_size,
            file_format: request.file_format,
            uploaded_by: principal.user_id().unwrap_or_default().to_string(),
            view: request.view,
            markers,
        };
        let map = self.store.create(map).await?;

        info!(id = %map.id, name = %map.name, "Campus map uploaded");
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, map.id(), "upload")
            .await;
        Ok(CampusMapView {
            map,
            is_active: false,
        })
    }

    /// Every map, newest first
    pub async fn list(&self, principal: &Principal) -> Result<Vec<CampusMapView>> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::CampusMap,
            None,
            "list",
            require_admin(principal),
        )
        .await?;

        let active = self.active.get().await?;
        let mut maps = self.store.list().await?;
        maps.reverse();
        Ok(maps
            .into_iter()
            .map(|map| {
                let is_active = active.as_deref() == Some(map.id.as_str());
                CampusMapView { map, is_active }
            })
            .collect())
    }

    /// The active map; public
    pub async fn active(&self) -> Result<CampusMapView> {
        let not_found = || GatehouseError::NotFound("No active map found".into());
        let id = self.active.get().await?.ok_or_else(not_found)?;
        let map = self.store.get(&id).await?.ok_or_else(not_found)?;
        Ok(CampusMapView {
            map,
            is_active: true,
        })
    }

    /// Make `id` the one active map
    pub async fn activate(&self, principal: &Principal, id: &str) -> Result<CampusMapView> {
        let _writes = self.writes.lock().await;
        let map = self.load(id).await?;

        let decision = self
            .policy
            .authorize_mutate(principal, &map, Action::Activate);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CampusMap,
            Some(id),
            "activate",
            decision,
        )
        .await?;

        let previous = self.active.set(id).await?;
        info!(id, previous = ?previous, "Campus map activated");
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, id, "activate")
            .await;
        Ok(CampusMapView {
            map,
            is_active: true,
        })
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        request: UpdateMapRequest,
    ) -> Result<CampusMapView> {
        let _writes = self.writes.lock().await;
        let mut map = self.load(id).await?;
        self.guard_edit(principal, &map, Action::Update, "update")
            .await?;

        if let Some(name) = request.name {
            map.name = required("Name", &name)?;
        }
        if let Some(model_url) = request.model_url {
            map.model_url = required("Model URL", &model_url)?;
        }
        if request.description.is_some() {
            map.description = optional(request.description);
        }
        if request.thumbnail_url.is_some() {
            map.thumbnail_url = optional(request.thumbnail_url);
        }
        if let Some(view) = request.view {
            map.view = view;
        }

        let map = self.store.update(map).await?;
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, id, "update")
            .await;
        self.view(map).await
    }

    /// Remove an inactive map
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let _writes = self.writes.lock().await;
        let map = self.load(id).await?;
        self.guard_edit(principal, &map, Action::Delete, "delete")
            .await?;

        if self.active.get().await?.as_deref() == Some(id) {
            return Err(GatehouseError::BadRequest(
                "Cannot delete the active map".into(),
            ));
        }
        if !self.store.delete(id).await? {
            return Err(GatehouseError::NotFound("Map not found".into()));
        }

        info!(id, "Campus map deleted");
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, id, "delete")
            .await;
        Ok(())
    }

    pub async fn add_marker(
        &self,
        principal: &Principal,
        id: &str,
        request: AddMarkerRequest,
    ) -> Result<CampusMapView> {
        let _writes = self.writes.lock().await;
        let mut map = self.load(id).await?;
        self.guard_edit(principal, &map, Action::Update, "add_marker")
            .await?;

        map.markers.push(request.into_marker()?);
        let map = self.store.update(map).await?;
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, id, "add_marker")
            .await;
        self.view(map).await
    }

    pub async fn delete_marker(
        &self,
        principal: &Principal,
        id: &str,
        marker_id: &str,
    ) -> Result<CampusMapView> {
        let _writes = self.writes.lock().await;
        let mut map = self.load(id).await?;
        self.guard_edit(principal, &map, Action::Update, "delete_marker")
            .await?;

        let before = map.markers.len();
        map.markers.retain(|m| m.id != marker_id);
        if map.markers.len() == before {
            return Err(GatehouseError::NotFound("Marker not found".into()));
        }

        let map = self.store.update(map).await?;
        self.audit
            .log_mutation(principal, ResourceKind::CampusMap, id, "delete_marker")
            .await;
        self.view(map).await
    }

    async fn guard_edit(
        &self,
        principal: &Principal,
        map: &CampusMapDoc,
        action: Action,
        operation: &str,
    ) -> Result<()> {
        let decision = self.policy.authorize_mutate(principal, map, action);
        enforce(
            &self.audit,
            principal,
            ResourceKind::CampusMap,
            Some(map.id()),
            operation,
            decision,
        )
        .await
    }

    async fn load(&self, id: &str) -> Result<CampusMapDoc> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("Map not found".into()))
    }

    async fn view(&self, map: CampusMapDoc) -> Result<CampusMapView> {
        let is_active = self.active.get().await?.as_deref() == Some(map.id.as_str());
        Ok(CampusMapView { map, is_active })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryPointer, MemoryStore};
    use crate::policy::{DenyReason, House, Role};

    fn service() -> MapService {
        MapService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryPointer::new()),
            Policy::default(),
            AuditLogger::new(),
        )
    }

    fn admin() -> Principal {
        Principal::user("652f1c0e9b1e8a0000000001", Role::Admin, House::None).unwrap()
    }

    fn upload(name: &str) -> UploadMapRequest {
        UploadMapRequest {
            name: name.into(),
            description: None,
            model_url: format!("/uploads/{name}.glb"),
            thumbnail_url: None,
            file_size: Some(1024),
            file_format: FileFormat::Glb,
            view: ViewSettings::default(),
            markers: vec![],
        }
    }

    #[tokio::test]
    async fn test_no_active_map() {
        let service = service();
        let err = service.active().await.unwrap_err();
        assert_eq!(err.to_string(), "Not found: No active map found");
    }

    #[tokio::test]
    async fn test_activation_swaps() {
        let service = service();
        let a = service.upload(&admin(), upload("north")).await.unwrap();
        let b = service.upload(&admin(), upload("south")).await.unwrap();
        assert!(!a.is_active);

        service.activate(&admin(), &a.map.id).await.unwrap();
        service.activate(&admin(), &b.map.id).await.unwrap();

        let listed = service.list(&admin()).await.unwrap();
        let active: Vec<&str> = listed
            .iter()
            .filter(|v| v.is_active)
            .map(|v| v.map.name.as_str())
            .collect();
        assert_eq!(active, vec!["south"]);
        assert_eq!(service.active().await.unwrap().map.id, b.map.id);
    }

    #[tokio::test]
    async fn test_active_map_cannot_be_deleted() {
        let service = service();
        let a = service.upload(&admin(), upload("north")).await.unwrap();
        service.activate(&admin(), &a.map.id).await.unwrap();

        let err = service.delete(&admin(), &a.map.id).await.unwrap_err();
        assert!(matches!(err, GatehouseError::BadRequest(_)));

        let b = service.upload(&admin(), upload("south")).await.unwrap();
        service.delete(&admin(), &b.map.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_admins_refused() {
        let service = service();
        let teacher = Principal::user("t1", Role::Teacher, House::Red).unwrap();

        let err = service.upload(&teacher, upload("rogue")).await.unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::InsufficientPrivilege)
        ));

        let a = service.upload(&admin(), upload("north")).await.unwrap();
        let err = service.activate(&teacher, &a.map.id).await.unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::InsufficientPrivilege)
        ));
        let err = service.list(&Principal::Anonymous).await.unwrap_err();
        assert!(matches!(
            err,
            GatehouseError::Denied(DenyReason::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_markers() {
        let service = service();
        let a = service.upload(&admin(), upload("north")).await.unwrap();

        let with_marker = service
            .add_marker(
                &admin(),
                &a.map.id,
                AddMarkerRequest {
                    name: "Library".into(),
                    description: Some("Ground floor".into()),
                    position: Vec3::new(1.0, 0.0, -2.0),
                    marker_type: MarkerType::Room,
                },
            )
            .await
            .unwrap();
        assert_eq!(with_marker.map.markers.len(), 1);
        let marker_id = with_marker.map.markers[0].id.clone();

        let err = service
            .delete_marker(&admin(), &a.map.id, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));

        let cleared = service
            .delete_marker(&admin(), &a.map.id, &marker_id)
            .await
            .unwrap();
        assert!(cleared.map.markers.is_empty());
    }
}
