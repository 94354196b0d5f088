//! Announcement document schema

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{Audience, Guarded, ResourceKind, Scope};

/// Collection name for announcements
pub const ANNOUNCEMENT_COLLECTION: &str = "announcements";

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 2000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnnouncementType {
    SchoolWide,
    HouseSpecific,
    Urgent,
    #[default]
    General,
}

/// Ordered low to urgent
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Announcement document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    pub title: String,
    pub content: String,

    #[serde(rename = "type")]
    pub announcement_type: AnnouncementType,

    /// `all` or a house
    #[serde(alias = "house")]
    pub scope: Scope,

    #[serde(default)]
    pub priority: Priority,

    /// Visible to visitors without an account
    #[serde(default)]
    pub is_public: bool,

    pub posted_by: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl AnnouncementDoc {
    /// Active and not past its expiry date
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expiry_date.map_or(true, |expiry| expiry > now)
    }
}

impl Guarded for AnnouncementDoc {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Announcement
    }

    fn audience(&self) -> Audience<'_> {
        Audience::Scoped(self.scope)
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.posted_by)
    }

    fn is_public(&self) -> bool {
        self.is_public
    }
}

impl Record for AnnouncementDoc {
    const COLLECTION: &'static str = ANNOUNCEMENT_COLLECTION;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl IntoIndexes for AnnouncementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "type": 1, "isActive": 1, "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("type_active_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "scope": 1, "isActive": 1 },
                Some(
                    IndexOptions::builder()
                        .name("scope_active_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AnnouncementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
