//! User document schema
//!
//! Accounts for staff and students. Usernames are school handles ending in
//! `@kvs`; the password is stored only as an Argon2 PHC string.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{House, UserRole};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Required suffix on every username
pub const USERNAME_SUFFIX: &str = "@kvs";

/// User document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    /// Lowercased handle, unique
    pub username: String,

    /// Argon2 password hash
    pub password_hash: String,

    pub full_name: String,

    pub role: UserRole,

    #[serde(default)]
    pub house: House,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Admin who registered this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    /// Create a new active user document
    pub fn new(
        username: &str,
        password_hash: String,
        full_name: String,
        role: UserRole,
        house: House,
    ) -> Self {
        let house = if role == UserRole::Admin {
            House::None
        } else {
            house
        };

        Self {
            id: String::new(),
            metadata: Metadata::new(),
            username: normalize_username(username),
            password_hash,
            full_name,
            role,
            house,
            email: None,
            phone: None,
            student_id: None,
            teacher_id: None,
            is_active: true,
            created_by: None,
        }
    }

    /// Public view without the password hash
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            house: self.house,
            email: self.email.clone(),
            phone: self.phone.clone(),
            student_id: self.student_id.clone(),
            teacher_id: self.teacher_id.clone(),
            is_active: self.is_active,
            metadata: self.metadata.clone(),
        }
    }
}

/// Lowercase and trim a username
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// User as returned by the API
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
    pub house: House,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    pub is_active: bool,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Record for UserDoc {
    const COLLECTION: &'static str = USER_COLLECTION;

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

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "role": 1, "house": 1 },
                Some(
                    IndexOptions::builder()
                        .name("role_house_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
