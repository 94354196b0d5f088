//! Mutation and delete guard

use super::{
    AppointmentStatus, AppointmentWith, Audience, Decision, DenyReason, Guarded, Identity,
    Policy, Principal, ResourceKind, Role, Scope,
};

/// What a principal wants to do to an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move an appointment to a new status
    UpdateStatus(AppointmentStatus),
    /// Edit content in place, scope untouched
    Update,
    Delete,
    /// Flip a community post's pinned flag
    PinToggle,
    /// Make a singleton resource the active one
    Activate,
    /// Change the scope of an announcement or post
    ChangeScope,
}

impl Policy {
    /// Decide whether `principal` may apply `action` to `resource`
    pub fn authorize_mutate<R: Guarded + ?Sized>(
        &self,
        principal: &Principal,
        resource: &R,
        action: Action,
    ) -> Decision {
        let identity = principal.identity().ok_or(DenyReason::NotAuthenticated)?;

        match action {
            Action::UpdateStatus(next) => self.update_status(identity, resource, next),
            Action::Update | Action::Delete => owner_or_admin(identity, resource, action),
            Action::PinToggle => pin_toggle(identity, resource),
            Action::Activate | Action::ChangeScope => admin_only(identity),
        }
    }

    fn update_status<R: Guarded + ?Sized>(
        &self,
        identity: &Identity,
        resource: &R,
        next: AppointmentStatus,
    ) -> Decision {
        if resource.kind() != ResourceKind::Appointment {
            return Err(DenyReason::InsufficientPrivilege);
        }

        match identity.role() {
            Role::Admin => {}
            Role::Teacher => match resource.audience() {
                Audience::Recipient {
                    with: AppointmentWith::Teacher,
                    teacher_id: Some(teacher_id),
                } if teacher_id == identity.id() => {}
                _ => return Err(DenyReason::NotOwner),
            },
            Role::Student => return Err(DenyReason::InsufficientPrivilege),
        }

        if self.config.enforce_status_transitions {
            if let Some(current) = resource.status() {
                if !current.can_transition_to(next) {
                    return Err(DenyReason::InvalidTransition);
                }
            }
        }

        Ok(())
    }
}

fn admin_only(identity: &Identity) -> Decision {
    if identity.role() == Role::Admin {
        Ok(())
    } else {
        Err(DenyReason::InsufficientPrivilege)
    }
}

fn owner_or_admin<R: Guarded + ?Sized>(identity: &Identity, resource: &R, action: Action) -> Decision {
    // A notification inbox belongs to its recipient alone
    if resource.kind() == ResourceKind::Notification {
        return owned_by(identity, resource);
    }

    if identity.role() == Role::Admin {
        return Ok(());
    }

    match resource.kind() {
        // Maps are admin records; appointments are removed by the office
        ResourceKind::CampusMap => return Err(DenyReason::InsufficientPrivilege),
        ResourceKind::Appointment if action == Action::Delete => {
            return Err(DenyReason::InsufficientPrivilege)
        }
        _ => {}
    }

    owned_by(identity, resource)
}

fn owned_by<R: Guarded + ?Sized>(identity: &Identity, resource: &R) -> Decision {
    match resource.owner() {
        Some(owner) if owner == identity.id() => Ok(()),
        _ => Err(DenyReason::NotOwner),
    }
}

fn pin_toggle<R: Guarded + ?Sized>(identity: &Identity, resource: &R) -> Decision {
    if resource.kind() != ResourceKind::CommunityPost {
        return Err(DenyReason::InsufficientPrivilege);
    }

    match identity.role() {
        Role::Admin => Ok(()),
        Role::Teacher => match resource.audience() {
            Audience::Scoped(Scope::House(house)) if house == identity.house() => Ok(()),
            _ => Err(DenyReason::HouseMismatch),
        },
        Role::Student => Err(DenyReason::InsufficientPrivilege),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{House, PolicyConfig};
    use super::*;

    struct Visit {
        teacher_id: Option<String>,
        with: AppointmentWith,
        status: AppointmentStatus,
    }

    impl Guarded for Visit {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Appointment
        }
        fn audience(&self) -> Audience<'_> {
            Audience::Recipient {
                with: self.with,
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

    struct Post {
        kind: ResourceKind,
        author: String,
        scope: Scope,
    }

    impl Guarded for Post {
        fn kind(&self) -> ResourceKind {
            self.kind
        }
        fn audience(&self) -> Audience<'_> {
            Audience::Scoped(self.scope)
        }
        fn owner(&self) -> Option<&str> {
            Some(&self.author)
        }
    }

    struct Map;

    impl Guarded for Map {
        fn kind(&self) -> ResourceKind {
            ResourceKind::CampusMap
        }
        fn audience(&self) -> Audience<'_> {
            Audience::Admins
        }
        fn owner(&self) -> Option<&str> {
            Some("t1")
        }
    }

    fn visit_for(teacher: &str) -> Visit {
        Visit {
            teacher_id: Some(teacher.into()),
            with: AppointmentWith::Teacher,
            status: AppointmentStatus::Pending,
        }
    }

    fn post(author: &str, scope: Scope) -> Post {
        Post {
            kind: ResourceKind::CommunityPost,
            author: author.into(),
            scope,
        }
    }

    fn user(id: &str, role: Role, house: House) -> Principal {
        Principal::user(id, role, house).unwrap()
    }

    #[test]
    fn test_teacher_cannot_update_another_teachers_appointment() {
        let policy = Policy::default();
        let t1 = user("t1", Role::Teacher, House::Red);

        let decision = policy.authorize_mutate(
            &t1,
            &visit_for("t2"),
            Action::UpdateStatus(AppointmentStatus::Approved),
        );
        assert_eq!(decision, Err(DenyReason::NotOwner));

        let decision = policy.authorize_mutate(
            &t1,
            &visit_for("t1"),
            Action::UpdateStatus(AppointmentStatus::Approved),
        );
        assert_eq!(decision, Ok(()));
    }

    #[test]
    fn test_office_appointments_need_admin() {
        let policy = Policy::default();
        let office = Visit {
            teacher_id: None,
            with: AppointmentWith::Principal,
            status: AppointmentStatus::Pending,
        };
        let action = Action::UpdateStatus(AppointmentStatus::Rejected);

        assert_eq!(
            policy.authorize_mutate(&user("t1", Role::Teacher, House::Red), &office, action),
            Err(DenyReason::NotOwner)
        );
        assert_eq!(
            policy.authorize_mutate(&user("a", Role::Admin, House::None), &office, action),
            Ok(())
        );
        assert_eq!(
            policy.authorize_mutate(&Principal::Anonymous, &office, action),
            Err(DenyReason::NotAuthenticated)
        );
    }

    #[test]
    fn test_status_transitions_loose_by_default() {
        let policy = Policy::default();
        let admin = user("a", Role::Admin, House::None);
        let mut visit = visit_for("t1");
        visit.status = AppointmentStatus::Completed;

        assert_eq!(
            policy.authorize_mutate(&admin, &visit, Action::UpdateStatus(AppointmentStatus::Pending)),
            Ok(())
        );
    }

    #[test]
    fn test_status_transitions_enforced() {
        let policy = Policy::new(PolicyConfig {
            enforce_status_transitions: true,
            ..Default::default()
        });
        let admin = user("a", Role::Admin, House::None);
        let mut visit = visit_for("t1");
        visit.status = AppointmentStatus::Approved;

        assert_eq!(
            policy.authorize_mutate(&admin, &visit, Action::UpdateStatus(AppointmentStatus::Pending)),
            Err(DenyReason::InvalidTransition)
        );
        assert_eq!(
            policy.authorize_mutate(
                &admin,
                &visit,
                Action::UpdateStatus(AppointmentStatus::Completed)
            ),
            Ok(())
        );
    }

    #[test]
    fn test_author_or_admin_may_edit() {
        let policy = Policy::default();
        let captain_post = post("s1", Scope::House(House::Blue));

        for action in [Action::Update, Action::Delete] {
            assert_eq!(
                policy.authorize_mutate(&user("s1", Role::Student, House::Blue), &captain_post, action),
                Ok(())
            );
            assert_eq!(
                policy.authorize_mutate(&user("s2", Role::Student, House::Blue), &captain_post, action),
                Err(DenyReason::NotOwner)
            );
            assert_eq!(
                policy.authorize_mutate(&user("t9", Role::Teacher, House::Blue), &captain_post, action),
                Err(DenyReason::NotOwner)
            );
            assert_eq!(
                policy.authorize_mutate(&user("a", Role::Admin, House::None), &captain_post, action),
                Ok(())
            );
        }
    }

    #[test]
    fn test_pin_toggle_by_house_teacher() {
        let policy = Policy::default();
        let blue = post("s1", Scope::House(House::Blue));

        assert_eq!(
            policy.authorize_mutate(&user("t1", Role::Teacher, House::Blue), &blue, Action::PinToggle),
            Ok(())
        );
        assert_eq!(
            policy.authorize_mutate(&user("t2", Role::Teacher, House::Red), &blue, Action::PinToggle),
            Err(DenyReason::HouseMismatch)
        );
        assert_eq!(
            policy.authorize_mutate(&user("s1", Role::Student, House::Blue), &blue, Action::PinToggle),
            Err(DenyReason::InsufficientPrivilege)
        );
        assert_eq!(
            policy.authorize_mutate(&user("a", Role::Admin, House::None), &blue, Action::PinToggle),
            Ok(())
        );

        let announcement = Post {
            kind: ResourceKind::Announcement,
            author: "t1".into(),
            scope: Scope::House(House::Blue),
        };
        assert_eq!(
            policy.authorize_mutate(
                &user("t1", Role::Teacher, House::Blue),
                &announcement,
                Action::PinToggle
            ),
            Err(DenyReason::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_activate_and_map_edits_admin_only() {
        let policy = Policy::default();
        let uploader = user("t1", Role::Teacher, House::Red);

        for action in [Action::Activate, Action::Update, Action::Delete] {
            assert_eq!(
                policy.authorize_mutate(&uploader, &Map, action),
                Err(DenyReason::InsufficientPrivilege)
            );
            assert_eq!(
                policy.authorize_mutate(&user("a", Role::Admin, House::None), &Map, action),
                Ok(())
            );
        }
    }

    #[test]
    fn test_scope_change_admin_only() {
        let policy = Policy::default();
        let own = post("t1", Scope::House(House::Red));
        assert_eq!(
            policy.authorize_mutate(&user("t1", Role::Teacher, House::Red), &own, Action::ChangeScope),
            Err(DenyReason::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_notifications_owner_only() {
        struct Inbox;

        impl Guarded for Inbox {
            fn kind(&self) -> ResourceKind {
                ResourceKind::Notification
            }
            fn audience(&self) -> Audience<'_> {
                Audience::User("s1")
            }
            fn owner(&self) -> Option<&str> {
                Some("s1")
            }
        }

        let policy = Policy::default();
        assert_eq!(
            policy.authorize_mutate(&user("s1", Role::Student, House::Red), &Inbox, Action::Update),
            Ok(())
        );
        assert_eq!(
            policy.authorize_mutate(&user("a", Role::Admin, House::None), &Inbox, Action::Update),
            Err(DenyReason::NotOwner)
        );
    }

    #[test]
    fn test_appointment_delete_admin_only() {
        let policy = Policy::default();
        assert_eq!(
            policy.authorize_mutate(
                &user("t1", Role::Teacher, House::Red),
                &visit_for("t1"),
                Action::Delete
            ),
            Err(DenyReason::InsufficientPrivilege)
        );
    }
}
