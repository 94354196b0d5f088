//! House community post schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{Audience, Guarded, ResourceKind, Scope};

/// Collection name for community posts
pub const COMMUNITY_POST_COLLECTION: &str = "community_posts";

pub const MAX_POST_TITLE_LEN: usize = 200;
pub const MAX_POST_CONTENT_LEN: usize = 5000;

/// Community post document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPostDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    pub title: String,
    pub content: String,

    /// `all` (school-wide) or a house
    #[serde(alias = "house")]
    pub scope: Scope,

    pub posted_by: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_pinned: bool,
}

fn default_true() -> bool {
    true
}

impl Guarded for CommunityPostDoc {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CommunityPost
    }

    fn audience(&self) -> Audience<'_> {
        Audience::Scoped(self.scope)
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.posted_by)
    }
}

impl Record for CommunityPostDoc {
    const COLLECTION: &'static str = COMMUNITY_POST_COLLECTION;

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

impl IntoIndexes for CommunityPostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "scope": 1, "isActive": 1, "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("scope_active_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "isPinned": -1, "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("pinned_recent_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CommunityPostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
