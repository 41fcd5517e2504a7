use std::fmt;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::NotificationKind;

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentChanges, AppointmentStatus, DOCTOR_CANCEL_REASON};
use crate::services::booking::AppointmentService;

/// Named moves of the appointment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Confirm,
    RequestCancel,
    ApproveCancel,
    RejectCancel,
    Cancel,
    StartTreatment,
    Complete,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Confirm => "confirm",
            Transition::RequestCancel => "request cancellation of",
            Transition::ApproveCancel => "approve cancellation of",
            Transition::RejectCancel => "reject cancellation of",
            Transition::Cancel => "cancel",
            Transition::StartTreatment => "start treatment for",
            Transition::Complete => "complete",
        })
    }
}

impl Transition {
    /// The move that takes `from` to the requested status, if any exists.
    pub fn between(from: AppointmentStatus, to: AppointmentStatus) -> Option<Transition> {
        use AppointmentStatus::*;

        match (from, to) {
            (CancelRequested, Confirmed) => Some(Transition::RejectCancel),
            (_, Confirmed) => Some(Transition::Confirm),
            (_, CancelRequested) => Some(Transition::RequestCancel),
            (CancelRequested, Cancelled) => Some(Transition::ApproveCancel),
            (_, Cancelled) => Some(Transition::Cancel),
            (_, InTreatment) => Some(Transition::StartTreatment),
            (_, Completed) => Some(Transition::Complete),
            (_, Pending) => None,
        }
    }
}

impl AppointmentStatus {
    /// Status reached by applying `transition`. Anything not listed here is
    /// rejected; `completed` and `cancelled` accept nothing.
    pub fn apply(self, transition: Transition) -> Result<AppointmentStatus, AppointmentError> {
        use AppointmentStatus::*;

        let from = self;
        let next = match (from, transition) {
            (Pending, Transition::Confirm) => Some(Confirmed),
            (Pending | Confirmed, Transition::RequestCancel) => Some(CancelRequested),
            (Pending | Confirmed | CancelRequested, Transition::Cancel) => Some(Cancelled),
            (Confirmed, Transition::StartTreatment) => Some(InTreatment),
            (CancelRequested, Transition::ApproveCancel) => Some(Cancelled),
            (CancelRequested, Transition::RejectCancel) => Some(Confirmed),
            (InTreatment, Transition::Complete) => Some(Completed),
            _ => None,
        };

        match next {
            Some(status) => {
                debug!("Transition {:?}: {} -> {}", transition, from, status);
                Ok(status)
            }
            None => {
                warn!("Rejected transition {:?} from {}", transition, from);
                Err(AppointmentError::InvalidTransition { from, transition })
            }
        }
    }
}

/// Notification emitted after a committed transition.
pub fn notification_for(transition: Transition, appointment: &Appointment) -> Option<NotificationKind> {
    match transition {
        Transition::Confirm => Some(NotificationKind::Confirmed),
        Transition::RejectCancel => Some(NotificationKind::CancellationRejected),
        Transition::ApproveCancel => Some(NotificationKind::CancellationApproved),
        Transition::Cancel => Some(NotificationKind::Cancelled {
            reason: appointment
                .cancel_reason
                .clone()
                .unwrap_or_else(|| DOCTOR_CANCEL_REASON.to_string()),
        }),
        Transition::RequestCancel | Transition::StartTreatment | Transition::Complete => None,
    }
}

// ==============================================================================
// LIFECYCLE OPERATIONS
// ==============================================================================

impl AppointmentService {
    #[instrument(skip(self))]
    pub async fn confirm(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        self.run_transition(&current, Transition::Confirm, AppointmentChanges::default())
            .await
    }

    /// Patient-initiated; the appointment waits in `cancel_requested` for staff.
    #[instrument(skip(self, reason))]
    pub async fn request_cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        let changes = AppointmentChanges {
            cancel_reason: reason.filter(|r| !r.trim().is_empty()),
            cancel_requested_at: Some(self.clock.now()),
            ..Default::default()
        };
        self.run_transition(&current, Transition::RequestCancel, changes).await
    }

    #[instrument(skip(self))]
    pub async fn approve_cancel(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        let changes = AppointmentChanges {
            cancel_confirmed_at: Some(self.clock.now()),
            ..Default::default()
        };
        self.run_transition(&current, Transition::ApproveCancel, changes).await
    }

    #[instrument(skip(self))]
    pub async fn reject_cancel(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        self.run_transition(&current, Transition::RejectCancel, AppointmentChanges::default())
            .await
    }

    /// Direct cancellation by the doctor or an admin.
    #[instrument(skip(self, reason))]
    pub async fn doctor_cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;

        match current.status {
            AppointmentStatus::Cancelled => {
                return Err(AppointmentError::GuardViolation(
                    "Appointment is already cancelled".to_string(),
                ))
            }
            AppointmentStatus::Completed | AppointmentStatus::InTreatment => {
                return Err(AppointmentError::GuardViolation(format!(
                    "Cannot cancel an appointment that is {}",
                    current.status
                )))
            }
            _ => {}
        }

        let changes = AppointmentChanges {
            cancel_reason: Some(
                reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| DOCTOR_CANCEL_REASON.to_string()),
            ),
            cancel_confirmed_at: Some(self.clock.now()),
            ..Default::default()
        };
        self.run_transition(&current, Transition::Cancel, changes).await
    }

    #[instrument(skip(self))]
    pub async fn start_treatment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        self.ensure_can_start(&current)?;
        self.run_transition(&current, Transition::StartTreatment, AppointmentChanges::default())
            .await
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;
        self.run_transition(&current, Transition::Complete, AppointmentChanges::default())
            .await
    }

    /// Treatment starts only on a confirmed appointment, on its own date,
    /// once its slot has begun. Checked in that order.
    pub(crate) fn ensure_can_start(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(AppointmentError::GuardViolation(
                "Only confirmed appointments can start treatment".to_string(),
            ));
        }
        if appointment.appointment_date != self.clock.today() {
            return Err(AppointmentError::GuardViolation(
                "Treatment can only start on the appointment date".to_string(),
            ));
        }
        if self.clock.local_now() < appointment.slot_start() {
            return Err(AppointmentError::GuardViolation(format!(
                "Treatment cannot start before the {} time slot",
                appointment.time_slot
            )));
        }
        Ok(())
    }

    /// Validates the move, persists it conditionally on the status the caller
    /// saw, then publishes the matching notification.
    async fn run_transition(
        &self,
        current: &Appointment,
        transition: Transition,
        mut changes: AppointmentChanges,
    ) -> Result<Appointment, AppointmentError> {
        changes.status = Some(current.status.apply(transition)?);

        let updated = self.commit(current, &changes).await?;
        if let Some(kind) = notification_for(transition, &updated) {
            self.notify(kind, &updated);
        }

        info!(
            "Appointment {} moved from {} to {}",
            updated.id, current.status, updated.status
        );
        Ok(updated)
    }
}
