//! Read-time filtering

use super::{
    AppointmentWith, Audience, Decision, DenyReason, Guarded, Policy, Principal, Role, Scope,
};

impl Policy {
    /// Keep the resources `principal` may see, preserving input order.
    pub fn filter_visible<T, I>(&self, principal: &Principal, resources: I) -> Vec<T>
    where
        T: Guarded,
        I: IntoIterator<Item = T>,
    {
        resources
            .into_iter()
            .filter(|resource| self.can_read(principal, resource))
            .collect()
    }

    /// Whether `principal` may see `resource`
    pub fn can_read<R: Guarded + ?Sized>(&self, principal: &Principal, resource: &R) -> bool {
        let identity = match principal {
            Principal::Anonymous => {
                return resource.is_public()
                    && resource.audience() == Audience::Scoped(Scope::All);
            }
            Principal::User(identity) => identity,
        };

        if identity.role() == Role::Admin {
            return true;
        }

        match resource.audience() {
            Audience::Scoped(Scope::All) => true,
            Audience::Scoped(Scope::House(house)) => house == identity.house(),
            Audience::Recipient { with, teacher_id } => match identity.role() {
                Role::Teacher => match with {
                    AppointmentWith::Teacher => teacher_id == Some(identity.id()),
                    AppointmentWith::Principal | AppointmentWith::VicePrincipal => {
                        !self.config.restrict_office_appointments
                    }
                },
                Role::Student | Role::Admin => false,
            },
            Audience::User(owner) => owner == identity.id(),
            Audience::Admins => false,
        }
    }

    /// Single-resource read check with a reason on denial
    pub fn authorize_read<R: Guarded + ?Sized>(
        &self,
        principal: &Principal,
        resource: &R,
    ) -> Decision {
        if self.can_read(principal, resource) {
            return Ok(());
        }

        let identity = match principal {
            Principal::Anonymous => return Err(DenyReason::NotAuthenticated),
            Principal::User(identity) => identity,
        };

        Err(match resource.audience() {
            Audience::Scoped(_) => DenyReason::HouseMismatch,
            Audience::Recipient { .. } if identity.role() == Role::Teacher => DenyReason::NotOwner,
            Audience::User(_) => DenyReason::NotOwner,
            Audience::Recipient { .. } | Audience::Admins => DenyReason::InsufficientPrivilege,
        })
    }
}
