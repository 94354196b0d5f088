//! Campus 3D map schema
//!
//! Which map is active is not stored here; see [`ActivePointer`].
//!
//! [`ActivePointer`]: crate::db::ActivePointer

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{Audience, Guarded, ResourceKind};

/// Collection name for campus maps
pub const CAMPUS_MAP_COLLECTION: &str = "campus_maps";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Glb,
    Gltf,
    Obj,
    Fbx,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    #[serde(default = "default_ambient")]
    pub ambient: f64,
    #[serde(default = "default_one")]
    pub directional: f64,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: default_ambient(),
            directional: default_one(),
        }
    }
}

/// Viewer settings for a map
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default = "default_camera_position")]
    pub camera_position: Vec3,
    #[serde(default)]
    pub camera_target: Vec3,
    #[serde(default = "default_one")]
    pub scale: f64,
    #[serde(default)]
    pub lighting: Lighting,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            camera_position: default_camera_position(),
            camera_target: Vec3::default(),
            scale: default_one(),
            lighting: Lighting::default(),
        }
    }
}

fn default_camera_position() -> Vec3 {
    Vec3::new(5.0, 5.0, 5.0)
}

fn default_ambient() -> f64 {
    0.5
}

fn default_one() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkerType {
    Room,
    Building,
    Facility,
    #[default]
    Other,
}

/// Labelled point on a map
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: Vec3,
    #[serde(rename = "type", default)]
    pub marker_type: MarkerType,
}

/// Campus map document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CampusMapDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Where the model file is served from
    pub model_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(default)]
    pub file_format: FileFormat,

    pub uploaded_by: String,

    #[serde(rename = "metadata", default)]
    pub view: ViewSettings,

    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl Guarded for CampusMapDoc {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CampusMap
    }

    fn audience(&self) -> Audience<'_> {
        Audience::Admins
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.uploaded_by)
    }
}

impl Record for CampusMapDoc {
    const COLLECTION: &'static str = CAMPUS_MAP_COLLECTION;

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

impl IntoIndexes for CampusMapDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "createdAt": -1 },
            Some(
                IndexOptions::builder()
                    .name("recent_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CampusMapDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_defaults() {
        let view: ViewSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(view.camera_position, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(view.camera_target, Vec3::default());
        assert_eq!(view.scale, 1.0);
        assert_eq!(view.lighting.ambient, 0.5);
        assert_eq!(view.lighting.directional, 1.0);
    }

    #[test]
    fn test_marker_wire_names() {
        let marker: Marker = serde_json::from_str(
            r#"{"_id":"m1","name":"Library","position":{"x":1,"y":0,"z":2},"type":"room"}"#,
        )
        .unwrap();
        assert_eq!(marker.marker_type, MarkerType::Room);
        assert_eq!(marker.position.z, 2.0);
    }
}
