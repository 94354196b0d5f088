//! Principals: who is acting on a request
//!
//! A principal is either anonymous or an authenticated identity carrying a
//! role and a house. Anonymous principals carry neither, so that invariant
//! holds by construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PolicyError;

/// Opaque user identifier (hex object id)
pub type UserId = String;

/// Stored account role
///
/// Captains and vice-captains are students with a title; they collapse to
/// [`Role::Student`] for every policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
    Captain,
    ViceCaptain,
}

impl UserRole {
    /// Privilege class used by the policy engine
    pub fn privilege(self) -> Role {
        match self {
            UserRole::Admin => Role::Admin,
            UserRole::Teacher => Role::Teacher,
            UserRole::Student | UserRole::Captain | UserRole::ViceCaptain => Role::Student,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
            UserRole::Captain => "captain",
            UserRole::ViceCaptain => "vice-captain",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            "captain" => Ok(UserRole::Captain),
            "vice-captain" | "vice_captain" => Ok(UserRole::ViceCaptain),
            other => Err(PolicyError::MalformedPrincipal(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Privilege class of an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}

/// House cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum House {
    Red,
    Blue,
    Green,
    Yellow,
    #[default]
    None,
}

impl House {
    /// The four real houses, in display order
    pub const ALL: [House; 4] = [House::Red, House::Blue, House::Green, House::Yellow];

    /// Whether this is one of the four real houses
    pub fn is_assigned(self) -> bool {
        !matches!(self, House::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            House::Red => "red",
            House::Blue => "blue",
            House::Green => "green",
            House::Yellow => "yellow",
            House::None => "none",
        }
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for House {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(House::Red),
            "blue" => Ok(House::Blue),
            "green" => Ok(House::Green),
            "yellow" => Ok(House::Yellow),
            "none" => Ok(House::None),
            other => Err(PolicyError::MalformedResource(format!(
                "unknown house '{other}'"
            ))),
        }
    }
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: UserId,
    role: Role,
    house: House,
}

impl Identity {
    /// Build an identity, rejecting shapes the engine cannot reason about.
    ///
    /// Admins are normalized to [`House::None`]; every other role must belong
    /// to a real house.
    pub fn new(id: impl Into<UserId>, role: Role, house: House) -> Result<Self, PolicyError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PolicyError::MalformedPrincipal("empty user id".into()));
        }

        let house = match role {
            Role::Admin => House::None,
            Role::Teacher | Role::Student if house.is_assigned() => house,
            Role::Teacher | Role::Student => {
                return Err(PolicyError::MalformedPrincipal(format!(
                    "{role} '{id}' has no house"
                )))
            }
        };

        Ok(Self { id, role, house })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn house(&self) -> House {
        self.house
    }
}

/// The acting identity for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(Identity),
}

impl Principal {
    /// Convenience constructor for an authenticated principal
    pub fn user(id: impl Into<UserId>, role: Role, house: House) -> Result<Self, PolicyError> {
        Identity::new(id, role, house).map(Principal::User)
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Principal::Anonymous => None,
            Principal::User(identity) => Some(identity),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity().map(Identity::id)
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(Identity::role)
    }

    pub fn house(&self) -> Option<House> {
        self.identity().map(Identity::house)
    }

    /// Label used in logs and audit records
    pub fn label(&self) -> String {
        match self {
            Principal::Anonymous => "anonymous".to_string(),
            Principal::User(identity) => format!("{}:{}", identity.role, identity.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captains_collapse_to_student() {
        assert_eq!(UserRole::Captain.privilege(), Role::Student);
        assert_eq!(UserRole::ViceCaptain.privilege(), Role::Student);
        assert_eq!(UserRole::Teacher.privilege(), Role::Teacher);
    }

    #[test]
    fn test_admin_house_is_ignored() {
        let admin = Identity::new("a1", Role::Admin, House::Red).unwrap();
        assert_eq!(admin.house(), House::None);
    }

    #[test]
    fn test_non_admin_requires_house() {
        assert!(Identity::new("t1", Role::Teacher, House::None).is_err());
        assert!(Identity::new("s1", Role::Student, House::None).is_err());
        assert!(Identity::new("s1", Role::Student, House::Green).is_ok());
    }

    #[test]
    fn test_empty_id_is_malformed() {
        assert!(matches!(
            Identity::new("  ", Role::Admin, House::None),
            Err(PolicyError::MalformedPrincipal(_))
        ));
    }

    #[test]
    fn test_anonymous_has_no_identity() {
        let anon = Principal::Anonymous;
        assert!(anon.user_id().is_none());
        assert!(anon.house().is_none());
        assert!(!anon.is_admin());
        assert_eq!(anon.label(), "anonymous");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("vice-captain".parse::<UserRole>().unwrap(), UserRole::ViceCaptain);
        assert!("janitor".parse::<UserRole>().is_err());
    }
}
