//! Resource store capability
//!
//! Services talk to storage only through [`ResourceStore`] and
//! [`ActivePointer`]. Both come in two flavours: process memory and MongoDB.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use dashmap::DashMap;
use std::fmt::Debug;
use tokio::sync::RwLock;
use tracing::debug;

use super::mongo::{MongoClient, MongoCollection};
use super::Record;
use crate::types::{GatehouseError, Result};

/// Fresh document id (24 hex chars, increasing within a process)
pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

/// CRUD over one collection of live (not soft-deleted) documents
#[async_trait]
pub trait ResourceStore<T: Record>: Send + Sync {
    /// All live documents in creation order
    async fn list(&self) -> Result<Vec<T>>;

    /// Live documents whose top-level string `field` equals `value`
    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>>;

    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Insert, assigning an id when the document has none
    async fn create(&self, item: T) -> Result<T>;

    /// Replace a live document; `NotFound` if it is gone
    async fn update(&self, item: T) -> Result<T>;

    /// Soft delete; false when there was nothing to delete
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Single-active-instance pointer for singleton resources
///
/// The active instance is whatever the pointer names. Swapping it is one
/// write, so readers see the old target or the new one and never both.
#[async_trait]
pub trait ActivePointer: Send + Sync {
    async fn get(&self) -> Result<Option<String>>;

    /// Point at `id`, returning the previous target
    async fn set(&self, id: &str) -> Result<Option<String>>;
}

/// In-process store backed by a concurrent map
pub struct MemoryStore<T> {
    docs: DashMap<String, T>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    fn live(&self) -> Vec<T> {
        let mut items: Vec<T> = self
            .docs
            .iter()
            .filter(|entry| !entry.value().metadata().is_deleted)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> ResourceStore<T> for MemoryStore<T> {
    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.live())
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>> {
        let mut matches = Vec::new();
        for item in self.live() {
            let json = serde_json::to_value(&item)
                .map_err(|e| GatehouseError::Internal(format!("encode failed: {e}")))?;
            if json.get(field).and_then(|v| v.as_str()) == Some(value) {
                matches.push(item);
            }
        }
        Ok(matches)
    }

    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self
            .docs
            .get(id)
            .filter(|entry| !entry.value().metadata().is_deleted)
            .map(|entry| entry.value().clone()))
    }

    async fn create(&self, mut item: T) -> Result<T> {
        if item.id().is_empty() {
            item.set_id(new_id());
        }
        item.mut_metadata().mark_created();

        match self.docs.entry(item.id().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GatehouseError::Conflict(format!(
                "{} '{}' already exists",
                T::COLLECTION,
                item.id()
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(item.clone());
                debug!(collection = T::COLLECTION, id = item.id(), "Inserted document");
                Ok(item)
            }
        }
    }

    async fn update(&self, mut item: T) -> Result<T> {
        match self.docs.get_mut(item.id()) {
            Some(mut entry) if !entry.metadata().is_deleted => {
                item.mut_metadata().touch();
                *entry = item.clone();
                Ok(item)
            }
            _ => Err(GatehouseError::NotFound(format!(
                "{} '{}' not found",
                T::COLLECTION,
                item.id()
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match self.docs.get_mut(id) {
            Some(mut entry) if !entry.metadata().is_deleted => {
                entry.mut_metadata().mark_deleted();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// MongoDB-backed store
pub struct MongoStore<T: Record + Debug> {
    collection: MongoCollection<T>,
}

impl<T: Record + Debug> MongoStore<T> {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection::<T>().await?,
        })
    }
}

#[async_trait]
impl<T: Record + Debug> ResourceStore<T> for MongoStore<T> {
    async fn list(&self) -> Result<Vec<T>> {
        self.collection.find_many(doc! {}).await
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>> {
        let mut filter = bson::Document::new();
        filter.insert(field, value);
        self.collection.find_many(filter).await
    }

    async fn get(&self, id: &str) -> Result<Option<T>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn create(&self, mut item: T) -> Result<T> {
        if item.id().is_empty() {
            item.set_id(new_id());
        }
        self.collection.insert_one(item).await
    }

    async fn update(&self, item: T) -> Result<T> {
        let (item, matched) = self.collection.replace_one(item).await?;
        if !matched {
            return Err(GatehouseError::NotFound(format!(
                "{} '{}' not found",
                T::COLLECTION,
                item.id()
            )));
        }
        Ok(item)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }
}

/// Pointer held in process memory
#[derive(Default)]
pub struct MemoryPointer {
    target: RwLock<Option<String>>,
}

impl MemoryPointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivePointer for MemoryPointer {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.target.read().await.clone())
    }

    async fn set(&self, id: &str) -> Result<Option<String>> {
        let mut target = self.target.write().await;
        Ok(target.replace(id.to_string()))
    }
}

/// Collection holding one pointer document per singleton kind
pub const POINTER_COLLECTION: &str = "active_pointers";

/// Pointer stored as a single MongoDB document, swapped with one upsert
pub struct MongoPointer {
    collection: mongodb::Collection<bson::Document>,
    name: String,
}

impl MongoPointer {
    pub fn new(client: &MongoClient, name: impl Into<String>) -> Self {
        Self {
            collection: client.raw_collection(POINTER_COLLECTION),
            name: name.into(),
        }
    }
}

#[async_trait]
impl ActivePointer for MongoPointer {
    async fn get(&self) -> Result<Option<String>> {
        let pointer = self.collection.find_one(doc! { "_id": &self.name }).await?;
        Ok(pointer.and_then(|d| d.get_str("target").ok().map(str::to_string)))
    }

    async fn set(&self, id: &str) -> Result<Option<String>> {
        let previous = self
            .collection
            .find_one_and_update(
                doc! { "_id": &self.name },
                doc! { "$set": { "target": id, "updatedAt": chrono::Utc::now().to_rfc3339() } },
            )
            .upsert(true)
            .return_document(mongodb::options::ReturnDocument::Before)
            .await?;
        Ok(previous.and_then(|d| d.get_str("target").ok().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{CommunityPostDoc, Metadata};
    use crate::policy::{House, Scope};
    use std::sync::Arc;

    fn post(title: &str, house: House) -> CommunityPostDoc {
        CommunityPostDoc {
            id: String::new(),
            metadata: Metadata::default(),
            title: title.into(),
            content: "hello".into(),
            scope: Scope::House(house),
            posted_by: "652f1c0e9b1e8a0012345678".into(),
            is_active: true,
            is_pinned: false,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let created = store.create(post("a", House::Red)).await.unwrap();

        assert_eq!(created.id.len(), 24);
        assert!(created.metadata.created_at.is_some());
        assert_eq!(store.get(&created.id).await.unwrap().unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = MemoryStore::new();
        for title in ["first", "second", "third"] {
            store.create(post(title, House::Red)).await.unwrap();
        }
        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_find_by_string_field() {
        let store = MemoryStore::new();
        store.create(post("r", House::Red)).await.unwrap();
        store.create(post("b", House::Blue)).await.unwrap();

        let blue = store.find_by("scope", "blue").await.unwrap();
        assert_eq!(blue.len(), 1);
        assert_eq!(blue[0].title, "b");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_document() {
        let store = MemoryStore::new();
        let created = store.create(post("gone", House::Red)).await.unwrap();

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.get(&created.id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());

        let err = store.update(created).await.unwrap_err();
        assert!(matches!(err, GatehouseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_replaces() {
        let store = MemoryStore::new();
        let mut created = store.create(post("old", House::Red)).await.unwrap();
        created.title = "new".into();
        store.update(created.clone()).await.unwrap();

        assert_eq!(store.get(&created.id).await.unwrap().unwrap().title, "new");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pointer_swaps_are_serialized() {
        let pointer = Arc::new(MemoryPointer::new());
        assert_eq!(pointer.get().await.unwrap(), None);

        let mut handles = Vec::new();
        for i in 0..16 {
            let pointer = pointer.clone();
            handles.push(tokio::spawn(async move {
                pointer.set(&format!("map-{i}")).await.unwrap()
            }));
        }

        let mut previous: Vec<Option<String>> = Vec::new();
        for handle in handles {
            previous.push(handle.await.unwrap());
        }

        // Exactly one swap saw the empty pointer
        assert_eq!(previous.iter().filter(|p| p.is_none()).count(), 1);
        assert!(pointer.get().await.unwrap().is_some());
    }
}
