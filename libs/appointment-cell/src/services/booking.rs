use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{NotificationEvent, NotificationKind, NotificationPublisher};
use schedule_cell::ScheduleRepository;
use shared_database::DatabaseError;
use shared_models::auth::{Role, User};
use shared_utils::clock::Clock;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentQuery, AppointmentStatus, AvailabilityCheck,
    BookAppointmentRequest, NewAppointment, TimeSlot, UpdateAppointmentRequest,
    DOCTOR_CANCEL_REASON,
};
use crate::repository::AppointmentRepository;
use crate::services::availability::AvailabilityService;
use crate::services::lifecycle::{notification_for, Transition};

const EXACT_DUPLICATE: &str = "You already have an appointment with this doctor in this time slot";
const PENDING_SAME_DAY: &str =
    "You already have a pending appointment with this doctor on this date";

/// Booking, rescheduling and reads. Lifecycle moves live in
/// `services::lifecycle`, the expiry sweep in `services::expiry`.
pub struct AppointmentService {
    pub(crate) appointments: Arc<dyn AppointmentRepository>,
    pub(crate) availability: AvailabilityService,
    pub(crate) notifier: NotificationPublisher,
    pub(crate) clock: Arc<dyn Clock>,
}

impl AppointmentService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        notifier: NotificationPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            availability: AvailabilityService::new(appointments.clone(), schedules),
            appointments,
            notifier,
            clock,
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Validation, past date, doctor's shift, duplicate guard, then capacity.
    /// The first failing check wins. New appointments start as `pending`.
    #[instrument(skip(self, request, actor), fields(doctor_id = %request.doctor_id))]
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = resolve_patient(request.patient_id, actor)?;

        let patient_name = request.patient_name.trim();
        if patient_name.is_empty() {
            return Err(AppointmentError::ValidationError(
                "patient_name is required".to_string(),
            ));
        }

        if request.appointment_date < self.clock.today() {
            return Err(AppointmentError::PastDate);
        }

        let shift = self
            .availability
            .shift_for(request.doctor_id, request.appointment_date)
            .await?
            .ok_or(AppointmentError::DoctorNotWorking(request.appointment_date))?;

        self.duplicate_guard(
            patient_id,
            request.doctor_id,
            request.appointment_date,
            request.time_slot,
            None,
        )
        .await?;

        if !self.availability.slot_has_capacity(&shift, request.time_slot, None).await? {
            return Err(AppointmentError::SlotFull(request.time_slot));
        }

        let patient_email = match actor.role {
            Role::Patient => request.patient_email.or_else(|| actor.email.clone()),
            _ => request.patient_email,
        };

        let row = NewAppointment {
            patient_id,
            patient_name: patient_name.to_string(),
            patient_dob: request.patient_dob,
            patient_phone: request.patient_phone,
            patient_email,
            patient_gender: request.patient_gender,
            patient_address: request.patient_address,
            doctor_id: request.doctor_id,
            department_id: request.department_id,
            schedule_id: Some(shift.id),
            appointment_date: request.appointment_date,
            time_slot: request.time_slot,
            reason: request.reason,
            status: AppointmentStatus::Pending,
        };

        let created = self
            .appointments
            .insert(&row)
            .await
            .map_err(duplicate_on_unique_violation)?;

        info!(
            "Booked appointment {} for patient {} on {} {}",
            created.id, created.patient_id, created.appointment_date, created.time_slot
        );
        Ok(created)
    }

    /// Runs only the duplicate-booking guard; capacity is not consulted.
    pub async fn check_availability(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<AvailabilityCheck, AppointmentError> {
        match self
            .duplicate_guard(patient_id, doctor_id, date, slot, None)
            .await
        {
            Ok(()) => Ok(AvailabilityCheck {
                available: true,
                message: "Time slot is available".to_string(),
            }),
            Err(AppointmentError::DuplicateBooking(message)) => Ok(AvailabilityCheck {
                available: false,
                message,
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        self.availability.available_slots(doctor_id, date).await
    }

    /// An exact (patient, doctor, date, slot) match on a live appointment is
    /// rejected first, then any pending appointment with the same doctor that day.
    async fn duplicate_guard(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if self
            .appointments
            .find_live_booking(patient_id, doctor_id, date, slot, exclude)
            .await?
            .is_some()
        {
            return Err(AppointmentError::DuplicateBooking(EXACT_DUPLICATE.to_string()));
        }

        if self
            .appointments
            .find_pending_on(patient_id, doctor_id, date, exclude)
            .await?
            .is_some()
        {
            return Err(AppointmentError::DuplicateBooking(PENDING_SAME_DAY.to_string()));
        }

        Ok(())
    }

    // ==========================================================================
    // UPDATE / RESCHEDULE
    // ==========================================================================

    /// Contact fields, a status change and a new date or slot in one write.
    /// A status change goes through the state machine; a move to another
    /// date or slot re-runs the shift, duplicate and capacity checks.
    #[instrument(skip(self, request, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(id).await?;

        // Echoing the current status back is not a change.
        let target_status = request.status.filter(|s| *s != current.status);
        if target_status.is_some() && !actor.is_staff() {
            return Err(AppointmentError::Forbidden(
                "Patients cannot change appointment status".to_string(),
            ));
        }

        let mut changes = AppointmentChanges {
            patient_name: request
                .patient_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            patient_dob: request.patient_dob,
            patient_phone: request.patient_phone,
            patient_email: request.patient_email,
            patient_gender: request.patient_gender,
            patient_address: request.patient_address,
            department_id: request.department_id,
            reason: request.reason,
            ..Default::default()
        };

        let transition = match target_status {
            Some(target) => Some(Transition::between(current.status, target).ok_or(
                AppointmentError::GuardViolation(format!(
                    "Cannot move an appointment from {} to {}",
                    current.status, target
                )),
            )?),
            None => None,
        };

        let new_status = match transition {
            Some(t) => {
                let next = current.status.apply(t)?;
                if t == Transition::StartTreatment {
                    self.ensure_can_start(&current)?;
                }
                self.stamp_transition(t, request.cancel_reason, &mut changes);
                changes.status = Some(next);
                next
            }
            None => {
                if let Some(reason) = request.cancel_reason.filter(|r| !r.trim().is_empty()) {
                    if !matches!(
                        current.status,
                        AppointmentStatus::CancelRequested | AppointmentStatus::Cancelled
                    ) {
                        return Err(AppointmentError::ValidationError(
                            "cancel_reason can only be set on a cancelled appointment or with a cancellation"
                                .to_string(),
                        ));
                    }
                    changes.cancel_reason = Some(reason);
                }
                current.status
            }
        };

        let new_date = request.appointment_date.unwrap_or(current.appointment_date);
        let new_slot = request.time_slot.unwrap_or(current.time_slot);
        let rescheduled =
            new_date != current.appointment_date || new_slot != current.time_slot;

        if rescheduled && new_status != AppointmentStatus::Cancelled {
            if current.status.is_terminal() {
                return Err(AppointmentError::GuardViolation(format!(
                    "Cannot reschedule an appointment that is {}",
                    current.status
                )));
            }
            if new_date < self.clock.today() {
                return Err(AppointmentError::PastDate);
            }

            let shift = self
                .availability
                .shift_for(current.doctor_id, new_date)
                .await?
                .ok_or(AppointmentError::DoctorNotWorking(new_date))?;

            self.duplicate_guard(
                current.patient_id,
                current.doctor_id,
                new_date,
                new_slot,
                Some(current.id),
            )
            .await?;

            if !self.availability.slot_has_capacity(&shift, new_slot, Some(current.id)).await? {
                return Err(AppointmentError::SlotFull(new_slot));
            }

            changes.schedule_id = Some(shift.id);
            changes.appointment_date = Some(new_date);
            changes.time_slot = Some(new_slot);
        }

        if changes.is_empty() {
            debug!("Update of appointment {} changed nothing", id);
            return Ok(current);
        }

        let updated = self.commit(&current, &changes).await?;

        if let Some(kind) = transition.and_then(|t| notification_for(t, &updated)) {
            self.notify(kind, &updated);
        }
        if rescheduled && updated.status != AppointmentStatus::Cancelled {
            self.notify(
                NotificationKind::Rescheduled {
                    previous_date: current.appointment_date,
                    previous_slot: current.time_slot.label().to_string(),
                },
                &updated,
            );
            info!(
                "Rescheduled appointment {} from {} {} to {} {}",
                updated.id,
                current.appointment_date,
                current.time_slot,
                updated.appointment_date,
                updated.time_slot
            );
        }

        Ok(updated)
    }

    fn stamp_transition(
        &self,
        transition: Transition,
        reason: Option<String>,
        changes: &mut AppointmentChanges,
    ) {
        let reason = reason.filter(|r| !r.trim().is_empty());
        match transition {
            Transition::RequestCancel => {
                changes.cancel_reason = reason;
                changes.cancel_requested_at = Some(self.clock.now());
            }
            Transition::Cancel => {
                changes.cancel_reason =
                    Some(reason.unwrap_or_else(|| DOCTOR_CANCEL_REASON.to_string()));
                changes.cancel_confirmed_at = Some(self.clock.now());
            }
            Transition::ApproveCancel => {
                changes.cancel_confirmed_at = Some(self.clock.now());
            }
            Transition::Confirm
            | Transition::RejectCancel
            | Transition::StartTreatment
            | Transition::Complete => {}
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.query(AppointmentQuery {
            newest_first: true,
            ..Default::default()
        })
        .await
    }

    pub async fn by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.query(AppointmentQuery {
            doctor_id: Some(doctor_id),
            statuses: status.into_iter().collect(),
            newest_first: true,
            ..Default::default()
        })
        .await
    }

    /// A doctor's day, in slot order.
    pub async fn by_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.query(AppointmentQuery {
            doctor_id: Some(doctor_id),
            date: Some(date),
            ..Default::default()
        })
        .await
    }

    pub async fn by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.query(AppointmentQuery {
            patient_id: Some(patient_id),
            newest_first: true,
            ..Default::default()
        })
        .await
    }

    pub async fn by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.query(AppointmentQuery {
            statuses: vec![status],
            ..Default::default()
        })
        .await
    }

    async fn query(&self, query: AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.appointments.list(&query).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        if !self.appointments.delete(id).await? {
            return Err(AppointmentError::NotFound);
        }
        info!("Deleted appointment {}", id);
        Ok(())
    }

    // ==========================================================================
    // SHARED
    // ==========================================================================

    /// Persists `changes` only if the row still has the status `current` was
    /// read with.
    pub(crate) async fn commit(
        &self,
        current: &Appointment,
        changes: &AppointmentChanges,
    ) -> Result<Appointment, AppointmentError> {
        match self
            .appointments
            .update(current.id, &[current.status], changes)
            .await
            .map_err(duplicate_on_unique_violation)?
        {
            Some(updated) => Ok(updated),
            None => {
                warn!("Appointment {} changed underneath a write", current.id);
                Err(AppointmentError::ConcurrentModification)
            }
        }
    }

    pub(crate) fn notify(&self, kind: NotificationKind, appointment: &Appointment) {
        self.notifier
            .publish(NotificationEvent::new(kind, appointment.notice()));
    }
}

fn resolve_patient(requested: Option<Uuid>, actor: &User) -> Result<Uuid, AppointmentError> {
    match (actor.role, requested) {
        (Role::Patient, None) => Ok(actor.id),
        (Role::Patient, Some(id)) if id == actor.id => Ok(id),
        (Role::Patient, Some(_)) => Err(AppointmentError::Forbidden(
            "Patients can only book appointments for themselves".to_string(),
        )),
        (_, Some(id)) => Ok(id),
        (_, None) => Err(AppointmentError::ValidationError(
            "patient_id is required when booking for a patient".to_string(),
        )),
    }
}

fn duplicate_on_unique_violation(err: DatabaseError) -> AppointmentError {
    if err.is_unique_violation() {
        AppointmentError::DuplicateBooking(EXACT_DUPLICATE.to_string())
    } else {
        err.into()
    }
}
