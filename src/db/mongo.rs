//! MongoDB client and collection wrapper

use bson::{doc, Document};
use mongodb::{options::IndexOptions, results::UpdateResult, Client, Collection, IndexModel};
use std::fmt::Debug;
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::types::GatehouseError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, GatehouseError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            GatehouseError::Database(format!("Failed to connect to MongoDB: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| GatehouseError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T: Record>(&self) -> Result<MongoCollection<T>, GatehouseError> {
        MongoCollection::new(&self.client, &self.db_name, T::COLLECTION).await
    }

    /// Untyped collection for bookkeeping documents
    pub fn raw_collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection(name)
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Record + Debug,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Record + Debug,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, GatehouseError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), GatehouseError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| GatehouseError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<T, GatehouseError> {
        item.mut_metadata().mark_created();

        self.inner
            .insert_one(&item)
            .await
            .map_err(|e| GatehouseError::Database(format!("Insert failed: {}", e)))?;

        Ok(item)
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, GatehouseError> {
        let mut full_filter = filter;
        full_filter.insert("isDeleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| GatehouseError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents by filter, in `_id` order
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, GatehouseError> {
        use futures_util::StreamExt;

        let mut full_filter = filter;
        full_filter.insert("isDeleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(full_filter)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| GatehouseError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Replace a live document by id; false when nothing matched
    pub async fn replace_one(&self, mut item: T) -> Result<(T, bool), GatehouseError> {
        item.mut_metadata().touch();
        let filter = doc! { "_id": item.id(), "isDeleted": { "$ne": true } };

        let result = self
            .inner
            .replace_one(filter, &item)
            .await
            .map_err(|e| GatehouseError::Database(format!("Update failed: {}", e)))?;

        Ok((item, result.matched_count > 0))
    }

    /// Soft delete a document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, GatehouseError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut full_filter = filter;
        full_filter.insert("isDeleted", doc! { "$ne": true });

        let update = doc! {
            "$set": {
                "isDeleted": true,
                "deletedAt": &now,
                "updatedAt": &now,
            }
        };

        self.inner
            .update_one(full_filter, update)
            .await
            .map_err(|e| GatehouseError::Database(format!("Update failed: {}", e)))
    }
}

