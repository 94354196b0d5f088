//! Database schemas for Gatehouse
//!
//! Document structures shared by the memory and MongoDB backends.

mod announcement;
mod appointment;
mod campus_map;
mod community_post;
mod metadata;
mod notification;
mod user;

pub use announcement::{
    AnnouncementDoc, AnnouncementType, Priority, ANNOUNCEMENT_COLLECTION, MAX_CONTENT_LEN,
    MAX_TITLE_LEN,
};
pub use appointment::{
    AppointmentDoc, VisitorType, APPOINTMENT_COLLECTION, MAX_NOTES_LEN, MAX_PURPOSE_LEN,
};
pub use campus_map::{
    CampusMapDoc, FileFormat, Lighting, Marker, MarkerType, Vec3, ViewSettings,
    CAMPUS_MAP_COLLECTION,
};
pub use community_post::{
    CommunityPostDoc, COMMUNITY_POST_COLLECTION, MAX_POST_CONTENT_LEN, MAX_POST_TITLE_LEN,
};
pub use metadata::Metadata;
pub use notification::{
    NotificationDoc, NotificationKind, NotificationPriority, NOTIFICATION_COLLECTION,
};
pub use user::{normalize_username, UserDoc, UserProfile, USERNAME_SUFFIX, USER_COLLECTION};
