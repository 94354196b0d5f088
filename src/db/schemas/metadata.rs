//! Common metadata for all documents
//!
//! Tracks creation, update, and soft deletion timestamps. Flattened into the
//! owning document so API bodies carry `createdAt`/`updatedAt` at top level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Stamp a fresh insert
    pub fn mark_created(&mut self) {
        let now = Utc::now();
        self.is_deleted = false;
        self.deleted_at = None;
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn mark_deleted(&mut self) {
        let now = Utc::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = Some(now);
    }
}
