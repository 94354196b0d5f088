//! Resource shapes as the policy engine sees them
//!
//! Stored documents implement [`Guarded`] to expose their audience and
//! owner. The engine never looks at anything else.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::principal::{House, UserId};
use super::PolicyError;

/// Resource kinds governed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Appointment,
    Announcement,
    CommunityPost,
    CampusMap,
    Notification,
    /// Accounts; guarded by role checks rather than the engine
    User,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Appointment => write!(f, "appointment"),
            ResourceKind::Announcement => write!(f, "announcement"),
            ResourceKind::CommunityPost => write!(f, "community_post"),
            ResourceKind::CampusMap => write!(f, "campus_map"),
            ResourceKind::Notification => write!(f, "notification"),
            ResourceKind::User => write!(f, "user"),
        }
    }
}

/// Audience of an announcement or community post
///
/// On the wire this is `"all"` (alias `"school-wide"`) or a house name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    All,
    House(House),
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::House(house) => house.as_str(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "school-wide" => Ok(Scope::All),
            other => match other.parse::<House>()? {
                House::None => Err(PolicyError::MalformedResource(
                    "scope must be 'all' or a house".into(),
                )),
                house => Ok(Scope::House(house)),
            },
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

/// Who an appointment is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentWith {
    Principal,
    #[serde(alias = "vice_principal")]
    VicePrincipal,
    Teacher,
}

impl AppointmentWith {
    /// Principal and vice-principal appointments are handled by the office
    pub fn is_office(self) -> bool {
        matches!(self, AppointmentWith::Principal | AppointmentWith::VicePrincipal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentWith::Principal => "principal",
            AppointmentWith::VicePrincipal => "vice-principal",
            AppointmentWith::Teacher => "teacher",
        }
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl AppointmentStatus {
    /// Pending and approved appointments hold their slot
    pub fn holds_slot(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }

    /// Forward edges of `pending -> approved | rejected`, `approved -> completed`
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience of a stored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience<'a> {
    /// Announcement or post scope
    Scoped(Scope),
    /// Appointment recipient
    Recipient {
        with: AppointmentWith,
        teacher_id: Option<&'a str>,
    },
    /// A single user's private record
    User(&'a str),
    /// Administrative records (campus maps)
    Admins,
}

/// What the engine needs to know about a resource
pub trait Guarded {
    fn kind(&self) -> ResourceKind;

    fn audience(&self) -> Audience<'_>;

    /// Author, uploader or recipient whose ownership grants update/delete
    fn owner(&self) -> Option<&str>;

    /// Explicit anonymous-visibility flag (announcements only)
    fn is_public(&self) -> bool {
        false
    }

    /// Current appointment status, if this is an appointment
    fn status(&self) -> Option<AppointmentStatus> {
        None
    }
}

impl<T: Guarded + ?Sized> Guarded for &T {
    fn kind(&self) -> ResourceKind {
        (**self).kind()
    }

    fn audience(&self) -> Audience<'_> {
        (**self).audience()
    }

    fn owner(&self) -> Option<&str> {
        (**self).owner()
    }

    fn is_public(&self) -> bool {
        (**self).is_public()
    }

    fn status(&self) -> Option<AppointmentStatus> {
        (**self).status()
    }
}

/// A bookable appointment slot
///
/// Two appointments collide when their slots are equal and both hold it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
    pub with: AppointmentWith,
    pub teacher_id: Option<UserId>,
}

impl Slot {
    /// Build a slot, requiring a teacher id exactly when addressed to a teacher
    pub fn new(
        date: NaiveDate,
        time: impl Into<String>,
        with: AppointmentWith,
        teacher_id: Option<UserId>,
    ) -> Result<Self, PolicyError> {
        let teacher_id = match (with, teacher_id) {
            (AppointmentWith::Teacher, Some(id)) if !id.is_empty() => Some(id),
            (AppointmentWith::Teacher, _) => {
                return Err(PolicyError::MalformedResource(
                    "teacher appointment without teacher id".into(),
                ))
            }
            (_, _) => None,
        };

        Ok(Self {
            date,
            time: time.into(),
            with,
            teacher_id,
        })
    }

    /// Hour component of `HH:MM`, if it parses
    pub fn hour(&self) -> Option<u32> {
        let (hour, _minutes) = self.time.split_once(':')?;
        hour.trim().parse().ok()
    }
}

/// An existing appointment as seen by the conflict check
pub trait Booking {
    fn slot(&self) -> Slot;
    fn booking_status(&self) -> AppointmentStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!("school-wide".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!("red".parse::<Scope>().unwrap(), Scope::House(House::Red));
        assert!("none".parse::<Scope>().is_err());
        assert!("purple".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_serde() {
        let json = serde_json::to_string(&Scope::House(House::Blue)).unwrap();
        assert_eq!(json, "\"blue\"");
        let scope: Scope = serde_json::from_str("\"school-wide\"").unwrap();
        assert_eq!(scope, Scope::All);
    }

    #[test]
    fn test_slot_hour() {
        let slot = Slot::new(date(), "08:30", AppointmentWith::Principal, None).unwrap();
        assert_eq!(slot.hour(), Some(8));
        let slot = Slot::new(date(), "noon", AppointmentWith::Principal, None).unwrap();
        assert_eq!(slot.hour(), None);
    }

    #[test]
    fn test_slot_requires_teacher_id_for_teacher() {
        assert!(Slot::new(date(), "10:00", AppointmentWith::Teacher, None).is_err());
        let office = Slot::new(
            date(),
            "10:00",
            AppointmentWith::Principal,
            Some("t1".into()),
        )
        .unwrap();
        assert_eq!(office.teacher_id, None);
    }

    #[test]
    fn test_status_chain() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_vice_principal_alias() {
        let with: AppointmentWith = serde_json::from_str("\"vice_principal\"").unwrap();
        assert_eq!(with, AppointmentWith::VicePrincipal);
    }
}
