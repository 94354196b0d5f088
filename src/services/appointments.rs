//! Visitor appointments
//!
//! Booking is check-then-act: the conflict scan and the insert must not
//! interleave with another booking for the same slot. [`SlotLocks`] hands out
//! one async mutex per slot key for the duration of that critical section.
//!
//! The locks are per process. Several gatehouse instances sharing one MongoDB
//! database do not serialize against each other.

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::notifications::NotificationService;
use super::{enforce, max_len, newest_first, optional, required};
use crate::db::schemas::{
    AppointmentDoc, Metadata, NotificationKind, NotificationPriority, UserDoc, VisitorType,
    MAX_NOTES_LEN, MAX_PURPOSE_LEN,
};
use crate::db::{Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{
    Action, AppointmentStatus, AppointmentWith, Booking, Decision, DenyReason, Policy, Principal,
    Proposal, ResourceKind, Role, Slot, UserRole,
};
use crate::types::{GatehouseError, Result};

/// Body of `POST /api/appointments`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub visitor_name: String,
    pub visitor_email: String,
    pub visitor_phone: String,
    #[serde(default)]
    pub visitor_type: VisitorType,
    pub appointment_with: AppointmentWith,
    #[serde(default)]
    pub teacher_id: Option<String>,
    pub purpose: String,
    /// `YYYY-MM-DD`
    pub preferred_date: String,
    /// `HH:MM`, 24-hour
    pub preferred_time: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_class: Option<String>,
}

/// Body of `PUT /api/appointments/{id}/status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query filters for the appointment listing
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub appointment_with: Option<AppointmentWith>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AppointmentFilter {
    fn matches(&self, appointment: &AppointmentDoc) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self
                .appointment_with
                .map_or(true, |w| appointment.appointment_with == w)
            && self
                .start_date
                .map_or(true, |d| appointment.preferred_date >= d)
            && self.end_date.map_or(true, |d| appointment.preferred_date <= d)
    }
}

/// One async mutex per appointment slot
#[derive(Default)]
pub struct SlotLocks {
    locks: DashMap<Slot, Arc<Mutex<()>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive hold of `slot`
    pub async fn acquire(&self, slot: &Slot) -> SlotGuard<'_> {
        let lock = self.locks.entry(slot.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        SlotGuard {
            locks: self,
            slot: slot.clone(),
            guard: Some(guard),
        }
    }

    /// Slots with a live mutex
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held slot; the mutex is released and reclaimed on drop
pub struct SlotGuard<'a> {
    locks: &'a SlotLocks,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.slot, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct AppointmentService {
    store: Arc<dyn ResourceStore<AppointmentDoc>>,
    users: Arc<dyn ResourceStore<UserDoc>>,
    notifications: Arc<NotificationService>,
    policy: Policy,
    audit: AuditLogger,
    slots: SlotLocks,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn ResourceStore<AppointmentDoc>>,
        users: Arc<dyn ResourceStore<UserDoc>>,
        notifications: Arc<NotificationService>,
        policy: Policy,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            users,
            notifications,
            policy,
            audit,
            slots: SlotLocks::new(),
        }
    }

    /// Book a visit; open to anonymous visitors
    pub async fn book(
        &self,
        principal: &Principal,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentDoc> {
        let visitor_name = required("Visitor name", &request.visitor_name)?;
        let visitor_email = required("Visitor email", &request.visitor_email)?.to_lowercase();
        if !visitor_email.contains('@') {
            return Err(GatehouseError::BadRequest(
                "Please enter a valid email".into(),
            ));
        }
        let visitor_phone = required("Visitor phone", &request.visitor_phone)?;
        let purpose = required("Purpose", &request.purpose)?;
        max_len("Purpose", &purpose, MAX_PURPOSE_LEN)?;
        let preferred_time =
            normalize_time(&required("Preferred time", &request.preferred_time)?);
        let preferred_date = NaiveDate::parse_from_str(request.preferred_date.trim(), "%Y-%m-%d")
            .map_err(|_| {
                GatehouseError::BadRequest("Preferred date must be YYYY-MM-DD".into())
            })?;

        let teacher_id = match request.appointment_with {
            AppointmentWith::Teacher => {
                let id = optional(request.teacher_id).ok_or_else(|| {
                    GatehouseError::BadRequest(
                        "Teacher ID is required for teacher appointments".into(),
                    )
                })?;
                if !self.is_active_teacher(&id).await? {
                    return Err(GatehouseError::BadRequest("Invalid teacher ID".into()));
                }
                Some(id)
            }
            AppointmentWith::Principal | AppointmentWith::VicePrincipal => None,
        };

        let slot = Slot::new(
            preferred_date,
            preferred_time.clone(),
            request.appointment_with,
            teacher_id.clone(),
        )?;

        let held = self.slots.acquire(&slot).await;

        let existing = self
            .store
            .find_by("preferredDate", &preferred_date.to_string())
            .await?;
        let decision = {
            let booked: Vec<&dyn Booking> = existing.iter().map(|a| a as &dyn Booking).collect();
            self.policy.authorize_create(
                principal,
                &Proposal::Appointment {
                    slot: &slot,
                    booked: &booked,
                },
            )
        };
        enforce(
            &self.audit,
            principal,
            ResourceKind::Appointment,
            None,
            "book",
            decision,
        )
        .await?;

        let appointment = AppointmentDoc {
            id: String::new(),
            metadata: Metadata::new(),
            visitor_name,
            visitor_email,
            visitor_phone,
            visitor_type: request.visitor_type,
            appointment_with: request.appointment_with,
            teacher_id,
            purpose,
            preferred_date,
            preferred_time,
            status: AppointmentStatus::Pending,
            approved_by: None,
            rejection_reason: None,
            notes: None,
            student_name: optional(request.student_name),
            student_class: optional(request.student_class),
        };
        let appointment = self.store.create(appointment).await?;
        drop(held);

        info!(
            id = %appointment.id,
            date = %appointment.preferred_date,
            time = %appointment.preferred_time,
            with = appointment.appointment_with.as_str(),
            "Appointment booked"
        );
        self.audit
            .log_mutation(principal, ResourceKind::Appointment, appointment.id(), "book")
            .await;
        self.notify_recipients(&appointment).await;

        Ok(appointment)
    }

    /// Appointments visible to a teacher or admin, newest first
    pub async fn list(
        &self,
        principal: &Principal,
        filter: AppointmentFilter,
    ) -> Result<Vec<AppointmentDoc>> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::Appointment,
            None,
            "list",
            staff_only(principal),
        )
        .await?;

        let all = self.store.list().await?;
        let mut visible: Vec<AppointmentDoc> = self
            .policy
            .filter_visible(principal, all)
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        newest_first(&mut visible, |a| (&a.metadata, a.id()));
        Ok(visible)
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> Result<AppointmentDoc> {
        let appointment = self.load(id).await?;
        let decision = self.policy.authorize_read(principal, &appointment);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Appointment,
            Some(id),
            "get",
            decision,
        )
        .await?;
        Ok(appointment)
    }

    /// Approve, reject, complete or reopen an appointment
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: &str,
        request: UpdateStatusRequest,
    ) -> Result<AppointmentDoc> {
        let notes = optional(request.notes);
        if let Some(notes) = &notes {
            max_len("Notes", notes, MAX_NOTES_LEN)?;
        }

        let current = self.load(id).await?;
        let slot = current.slot();
        let _held = self.slots.acquire(&slot).await;

        // Re-read under the slot lock so the guard sees the committed status
        let mut appointment = self.load(id).await?;
        let decision = self.policy.authorize_mutate(
            principal,
            &appointment,
            Action::UpdateStatus(request.status),
        );
        enforce(
            &self.audit,
            principal,
            ResourceKind::Appointment,
            Some(id),
            "update_status",
            decision,
        )
        .await?;

        if request.status.holds_slot() && !appointment.status.holds_slot() {
            let reopened = self.reopen_check(&appointment).await?;
            enforce(
                &self.audit,
                principal,
                ResourceKind::Appointment,
                Some(id),
                "update_status",
                reopened,
            )
            .await?;
        }

        let previous = appointment.status;
        appointment.status = request.status;
        appointment.approved_by = principal.user_id().map(str::to_string);
        if let Some(reason) = optional(request.rejection_reason) {
            appointment.rejection_reason = Some(reason);
        }
        if notes.is_some() {
            appointment.notes = notes;
        }

        let appointment = self.store.update(appointment).await?;
        info!(
            id,
            from = previous.as_str(),
            to = appointment.status.as_str(),
            by = %principal.label(),
            "Appointment status changed"
        );
        self.audit
            .log_mutation(principal, ResourceKind::Appointment, id, "update_status")
            .await;
        Ok(appointment)
    }

    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let appointment = self.load(id).await?;
        let decision = self
            .policy
            .authorize_mutate(principal, &appointment, Action::Delete);
        enforce(
            &self.audit,
            principal,
            ResourceKind::Appointment,
            Some(id),
            "delete",
            decision,
        )
        .await?;

        if !self.store.delete(id).await? {
            return Err(GatehouseError::NotFound("Appointment not found".into()));
        }
        self.audit
            .log_mutation(principal, ResourceKind::Appointment, id, "delete")
            .await;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<AppointmentDoc> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("Appointment not found".into()))
    }

    async fn is_active_teacher(&self, id: &str) -> Result<bool> {
        Ok(matches!(
            self.users.get(id).await?,
            Some(user) if user.role == UserRole::Teacher && user.is_active
        ))
    }

    /// A rejected or completed appointment may only take its slot back if free
    async fn reopen_check(&self, appointment: &AppointmentDoc) -> Result<Decision> {
        let slot = appointment.slot();
        let others = self
            .store
            .find_by("preferredDate", &appointment.preferred_date.to_string())
            .await?;
        let taken = others.iter().any(|other| {
            other.id != appointment.id && other.status.holds_slot() && other.slot() == slot
        });
        Ok(if taken {
            Err(DenyReason::SlotConflict)
        } else {
            Ok(())
        })
    }

    /// Best effort: the booking is already committed when this runs
    async fn notify_recipients(&self, appointment: &AppointmentDoc) {
        let recipients: Vec<String> = match appointment.appointment_with {
            AppointmentWith::Teacher => appointment.teacher_id.iter().cloned().collect(),
            AppointmentWith::Principal | AppointmentWith::VicePrincipal => {
                match self.users.find_by("role", UserRole::Admin.as_str()).await {
                    Ok(admins) => admins
                        .into_iter()
                        .filter(|u| u.is_active)
                        .map(|u| u.id)
                        .collect(),
                    Err(e) => {
                        warn!(
                            id = %appointment.id,
                            error = %e,
                            "Could not look up appointment recipients"
                        );
                        return;
                    }
                }
            }
        };
        debug!(count = recipients.len(), id = %appointment.id, "Notifying appointment recipients");

        let message = format!(
            "{} requested an appointment on {} at {}",
            appointment.visitor_name, appointment.preferred_date, appointment.preferred_time
        );
        self.notifications
            .notify(
                recipients,
                NotificationKind::Appointment,
                "New Appointment Request",
                &message,
                appointment.id(),
                NotificationPriority::Medium,
            )
            .await;
    }
}

/// Zero-pad `H:MM` to `HH:MM` so equal times share one slot key
///
/// Text that is not `<number>:<number>` is kept as given; the opening-hours
/// check rejects it.
fn normalize_time(time: &str) -> String {
    let parsed = time.split_once(':').and_then(|(hour, minute)| {
        let hour: u32 = hour.trim().parse().ok()?;
        let minute: u32 = minute.trim().parse().ok()?;
        Some((hour, minute))
    });
    match parsed {
        Some((hour, minute)) => format!("{hour:02}:{minute:02}"),
        None => time.to_string(),
    }
}

/// Only staff list appointments
fn staff_only(principal: &Principal) -> Decision {
    match principal.role() {
        None => Err(DenyReason::NotAuthenticated),
        Some(Role::Admin | Role::Teacher) => Ok(()),
        Some(Role::Student) => Err(DenyReason::InsufficientPrivilege),
    }
}
