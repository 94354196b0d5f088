//! Create guard

use super::{Booking, Decision, DenyReason, Policy, Principal, ResourceKind, Role, Scope, Slot};

/// First bookable hour (inclusive)
pub const OPENING_HOUR: u32 = 9;
/// Closing hour (exclusive)
pub const CLOSING_HOUR: u32 = 18;

/// A resource someone wants to create
pub enum Proposal<'a> {
    /// Appointment request plus the bookings it must not collide with
    Appointment {
        slot: &'a Slot,
        booked: &'a [&'a dyn Booking],
    },
    Announcement {
        scope: Scope,
    },
    CommunityPost {
        scope: Scope,
    },
    CampusMap,
}

impl Proposal<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Proposal::Appointment { .. } => ResourceKind::Appointment,
            Proposal::Announcement { .. } => ResourceKind::Announcement,
            Proposal::CommunityPost { .. } => ResourceKind::CommunityPost,
            Proposal::CampusMap => ResourceKind::CampusMap,
        }
    }
}

impl Policy {
    /// Decide whether `principal` may create `proposal`
    pub fn authorize_create(&self, principal: &Principal, proposal: &Proposal<'_>) -> Decision {
        if let Proposal::Appointment { slot, booked } = proposal {
            return check_slot(slot, booked);
        }

        let identity = principal.identity().ok_or(DenyReason::NotAuthenticated)?;
        if identity.role() == Role::Admin {
            return Ok(());
        }

        match proposal {
            Proposal::Appointment { .. } => Ok(()),
            Proposal::Announcement { scope } => match (identity.role(), scope) {
                (Role::Teacher, Scope::All) => Err(DenyReason::InsufficientPrivilege),
                (Role::Teacher, Scope::House(house)) if *house == identity.house() => Ok(()),
                (Role::Teacher, Scope::House(_)) => Err(DenyReason::HouseMismatch),
                (Role::Student | Role::Admin, _) => Err(DenyReason::InsufficientPrivilege),
            },
            Proposal::CommunityPost { scope } => match scope {
                Scope::All => Err(DenyReason::InsufficientPrivilege),
                Scope::House(house) if *house == identity.house() => Ok(()),
                Scope::House(_) => Err(DenyReason::HouseMismatch),
            },
            Proposal::CampusMap => Err(DenyReason::InsufficientPrivilege),
        }
    }
}

/// Opening-hours window then the pending/approved collision scan
fn check_slot(slot: &Slot, booked: &[&dyn Booking]) -> Decision {
    match slot.hour() {
        Some(hour) if (OPENING_HOUR..CLOSING_HOUR).contains(&hour) => {}
        _ => return Err(DenyReason::InvalidTimeWindow),
    }

    let taken = booked
        .iter()
        .any(|existing| existing.booking_status().holds_slot() && existing.slot() == *slot);

    if taken {
        Err(DenyReason::SlotConflict)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AppointmentStatus, AppointmentWith, House};
    use super::*;
    use chrono::NaiveDate;

    struct Booked {
        slot: Slot,
        status: AppointmentStatus,
    }

    impl Booking for Booked {
        fn slot(&self) -> Slot {
            self.slot.clone()
        }
        fn booking_status(&self) -> AppointmentStatus {
            self.status
        }
    }

    fn slot(time: &str) -> Slot {
        Slot::new(
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time,
            AppointmentWith::Principal,
            None,
        )
        .unwrap()
    }

    fn user(role: Role, house: House) -> Principal {
        Principal::user("u1", role, house).unwrap()
    }

    #[test]
    fn test_anonymous_cannot_announce() {
        let policy = Policy::default();
        for scope in [Scope::All, Scope::House(House::Red)] {
            assert_eq!(
                policy.authorize_create(&Principal::Anonymous, &Proposal::Announcement { scope }),
                Err(DenyReason::NotAuthenticated)
            );
            assert_eq!(
                policy.authorize_create(&Principal::Anonymous, &Proposal::CommunityPost { scope }),
                Err(DenyReason::NotAuthenticated)
            );
        }
    }

    #[test]
    fn test_anonymous_may_book_open_slot() {
        let policy = Policy::default();
        let requested = slot("10:15");
        let proposal = Proposal::Appointment {
            slot: &requested,
            booked: &[],
        };
        assert_eq!(policy.authorize_create(&Principal::Anonymous, &proposal), Ok(()));
    }

    #[test]
    fn test_time_window() {
        let policy = Policy::default();
        for (time, expected) in [
            ("08:30", Err(DenyReason::InvalidTimeWindow)),
            ("09:00", Ok(())),
            ("17:59", Ok(())),
            ("18:00", Err(DenyReason::InvalidTimeWindow)),
            ("9:99", Ok(())),
            ("later", Err(DenyReason::InvalidTimeWindow)),
        ] {
            let requested = slot(time);
            let proposal = Proposal::Appointment {
                slot: &requested,
                booked: &[],
            };
            assert_eq!(
                policy.authorize_create(&Principal::Anonymous, &proposal),
                expected,
                "time {time}"
            );
        }
    }

    #[test]
    fn test_slot_conflict_only_for_live_bookings() {
        let policy = Policy::default();
        let requested = slot("11:00");

        let pending = Booked {
            slot: slot("11:00"),
            status: AppointmentStatus::Pending,
        };
        let rejected = Booked {
            slot: slot("11:00"),
            status: AppointmentStatus::Rejected,
        };
        let elsewhere = Booked {
            slot: slot("12:00"),
            status: AppointmentStatus::Approved,
        };

        let booked: Vec<&dyn Booking> = vec![&rejected, &elsewhere];
        let proposal = Proposal::Appointment {
            slot: &requested,
            booked: &booked,
        };
        assert_eq!(policy.authorize_create(&Principal::Anonymous, &proposal), Ok(()));

        let booked: Vec<&dyn Booking> = vec![&rejected, &pending];
        let proposal = Proposal::Appointment {
            slot: &requested,
            booked: &booked,
        };
        assert_eq!(
            policy.authorize_create(&Principal::Anonymous, &proposal),
            Err(DenyReason::SlotConflict)
        );
    }

    #[test]
    fn test_teacher_announcements() {
        let policy = Policy::default();
        let teacher = user(Role::Teacher, House::Red);

        assert_eq!(
            policy.authorize_create(
                &teacher,
                &Proposal::Announcement {
                    scope: Scope::House(House::Red)
                }
            ),
            Ok(())
        );
        assert_eq!(
            policy.authorize_create(
                &teacher,
                &Proposal::Announcement {
                    scope: Scope::House(House::Blue)
                }
            ),
            Err(DenyReason::HouseMismatch)
        );
        assert_eq!(
            policy.authorize_create(&teacher, &Proposal::Announcement { scope: Scope::All }),
            Err(DenyReason::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_students_post_only_in_own_house() {
        let policy = Policy::default();
        let captain = user(Role::Student, House::Green);

        assert_eq!(
            policy.authorize_create(
                &captain,
                &Proposal::CommunityPost {
                    scope: Scope::House(House::Green)
                }
            ),
            Ok(())
        );
        assert_eq!(
            policy.authorize_create(
                &captain,
                &Proposal::CommunityPost {
                    scope: Scope::House(House::Yellow)
                }
            ),
            Err(DenyReason::HouseMismatch)
        );
        assert_eq!(
            policy.authorize_create(&captain, &Proposal::CommunityPost { scope: Scope::All }),
            Err(DenyReason::InsufficientPrivilege)
        );
        assert_eq!(
            policy.authorize_create(
                &captain,
                &Proposal::Announcement {
                    scope: Scope::House(House::Green)
                }
            ),
            Err(DenyReason::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_admin_creates_anything() {
        let policy = Policy::default();
        let admin = user(Role::Admin, House::None);

        assert!(policy
            .authorize_create(&admin, &Proposal::Announcement { scope: Scope::All })
            .is_ok());
        assert!(policy
            .authorize_create(
                &admin,
                &Proposal::CommunityPost {
                    scope: Scope::House(House::Blue)
                }
            )
            .is_ok());
        assert!(policy.authorize_create(&admin, &Proposal::CampusMap).is_ok());
        assert_eq!(
            policy.authorize_create(&user(Role::Teacher, House::Red), &Proposal::CampusMap),
            Err(DenyReason::InsufficientPrivilege)
        );
    }
}
