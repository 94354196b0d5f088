//! Appointment document schema
//!
//! Visitor requests to meet the principal, vice-principal or a teacher.

use bson::{doc, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::db::Record;
use crate::policy::{
    AppointmentStatus, AppointmentWith, Audience, Booking, Guarded, ResourceKind, Slot,
};

/// Collection name for appointments
pub const APPOINTMENT_COLLECTION: &str = "appointments";

pub const MAX_PURPOSE_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 1000;

/// Who is asking for the appointment
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisitorType {
    Parent,
    Volunteer,
    #[default]
    Visitor,
    Other,
}

/// Appointment document
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDoc {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(flatten)]
    pub metadata: Metadata,

    pub visitor_name: String,
    pub visitor_email: String,
    pub visitor_phone: String,
    pub visitor_type: VisitorType,

    pub appointment_with: AppointmentWith,

    /// Teacher user id, present only for teacher appointments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,

    pub purpose: String,

    /// `YYYY-MM-DD`
    pub preferred_date: NaiveDate,

    /// `HH:MM`
    pub preferred_time: String,

    #[serde(default)]
    pub status: AppointmentStatus,

    /// Last user to change the status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_class: Option<String>,
}

impl Guarded for AppointmentDoc {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Appointment
    }

    fn audience(&self) -> Audience<'_> {
        Audience::Recipient {
            with: self.appointment_with,
            teacher_id: self.teacher_id.as_deref(),
        }
    }

    fn owner(&self) -> Option<&str> {
        self.teacher_id.as_deref()
    }

    fn status(&self) -> Option<AppointmentStatus> {
        Some(self.status)
    }
}

impl Booking for AppointmentDoc {
    fn slot(&self) -> Slot {
        Slot {
            date: self.preferred_date,
            time: self.preferred_time.clone(),
            with: self.appointment_with,
            teacher_id: match self.appointment_with {
                AppointmentWith::Teacher => self.teacher_id.clone(),
                AppointmentWith::Principal | AppointmentWith::VicePrincipal => None,
            },
        }
    }

    fn booking_status(&self) -> AppointmentStatus {
        self.status
    }
}

impl Record for AppointmentDoc {
    const COLLECTION: &'static str = APPOINTMENT_COLLECTION;

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

impl IntoIndexes for AppointmentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "preferredDate": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("date_status_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "appointmentWith": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("with_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AppointmentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
