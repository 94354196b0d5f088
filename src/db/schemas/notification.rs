//! Per-user notification schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{Audience, Guarded, ResourceKind};

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Appointment,
    Announcement,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Notification document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    /// User id of the inbox owner
    pub recipient: String,

    #[serde(rename = "type")]
    pub kind: NotificationKind,

    pub title: String,
    pub message: String,

    /// Id of the appointment or announcement this is about
    pub related_id: String,

    #[serde(default)]
    pub priority: NotificationPriority,

    #[serde(default)]
    pub is_read: bool,
}

impl NotificationDoc {
    pub fn new(
        recipient: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: impl Into<String>,
        priority: NotificationPriority,
    ) -> Self {
        Self {
            id: String::new(),
            metadata: Metadata::new(),
            recipient: recipient.into(),
            kind,
            title: title.into(),
            message: message.into(),
            related_id: related_id.into(),
            priority,
            is_read: false,
        }
    }
}

impl Guarded for NotificationDoc {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Notification
    }

    fn audience(&self) -> Audience<'_> {
        Audience::User(&self.recipient)
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.recipient)
    }
}

impl Record for NotificationDoc {
    const COLLECTION: &'static str = NOTIFICATION_COLLECTION;

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

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "recipient": 1, "isRead": 1, "createdAt": -1 },
            Some(
                IndexOptions::builder()
                    .name("recipient_inbox_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
