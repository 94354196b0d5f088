//! Persistence for Gatehouse
//!
//! Schemas, the [`ResourceStore`] capability and its memory and MongoDB
//! backends.

pub mod mongo;
pub mod schemas;
pub mod store;

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use store::{
    new_id, ActivePointer, MemoryPointer, MemoryStore, MongoPointer, MongoStore, ResourceStore,
};

use crate::types::Result;
use schemas::{
    AnnouncementDoc, AppointmentDoc, CampusMapDoc, CommunityPostDoc, Metadata, NotificationDoc,
    UserDoc,
};

/// A stored document kind
pub trait Record:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + Unpin + IntoIndexes + MutMetadata + 'static
{
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn metadata(&self) -> &Metadata;
}

/// Every store the services use
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn ResourceStore<UserDoc>>,
    pub appointments: Arc<dyn ResourceStore<AppointmentDoc>>,
    pub announcements: Arc<dyn ResourceStore<AnnouncementDoc>>,
    pub community: Arc<dyn ResourceStore<CommunityPostDoc>>,
    pub maps: Arc<dyn ResourceStore<CampusMapDoc>>,
    pub notifications: Arc<dyn ResourceStore<NotificationDoc>>,
    /// Which campus map is active
    pub active_map: Arc<dyn ActivePointer>,
}

impl Stores {
    /// All collections in process memory
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryStore::new()),
            appointments: Arc::new(MemoryStore::new()),
            announcements: Arc::new(MemoryStore::new()),
            community: Arc::new(MemoryStore::new()),
            maps: Arc::new(MemoryStore::new()),
            notifications: Arc::new(MemoryStore::new()),
            active_map: Arc::new(MemoryPointer::new()),
        }
    }

    /// All collections in MongoDB, creating indexes as needed
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: Arc::new(MongoStore::new(client).await?),
            appointments: Arc::new(MongoStore::new(client).await?),
            announcements: Arc::new(MongoStore::new(client).await?),
            community: Arc::new(MongoStore::new(client).await?),
            maps: Arc::new(MongoStore::new(client).await?),
            notifications: Arc::new(MongoStore::new(client).await?),
            active_map: Arc::new(MongoPointer::new(client, CampusMapDoc::COLLECTION)),
        })
    }
}
