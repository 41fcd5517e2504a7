use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use schedule_cell::{Schedule, ScheduleRepository};

use crate::error::AppointmentError;
use crate::models::{AppointmentQuery, AppointmentStatus, TimeSlot};
use crate::repository::AppointmentRepository;

/// Slot capacity derived from a doctor's shift and the live bookings on it.
pub struct AvailabilityService {
    appointments: Arc<dyn AppointmentRepository>,
    schedules: Arc<dyn ScheduleRepository>,
}

impl AvailabilityService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        schedules: Arc<dyn ScheduleRepository>,
    ) -> Self {
        Self {
            appointments,
            schedules,
        }
    }

    pub async fn shift_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Schedule>, AppointmentError> {
        Ok(self.schedules.find_for_doctor_on(doctor_id, date).await?)
    }

    /// Non-cancelled bookings per slot, optionally ignoring one appointment.
    async fn booked_per_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<HashMap<TimeSlot, usize>, AppointmentError> {
        let live = self
            .appointments
            .list(&AppointmentQuery {
                doctor_id: Some(doctor_id),
                date: Some(date),
                statuses: AppointmentStatus::LIVE.to_vec(),
                ..Default::default()
            })
            .await?;

        let mut counts = HashMap::new();
        for appointment in live.iter().filter(|a| Some(a.id) != exclude) {
            *counts.entry(appointment.time_slot).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Slots on `date` that still have room, in chronological order. Empty
    /// when the doctor has no shift that day.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        let Some(shift) = self.shift_for(doctor_id, date).await? else {
            debug!("Doctor {} has no shift on {}", doctor_id, date);
            return Ok(Vec::new());
        };

        let capacity = shift.capacity();
        let booked = self.booked_per_slot(doctor_id, date, None).await?;

        Ok(TimeSlot::ALL
            .into_iter()
            .filter(|slot| booked.get(slot).copied().unwrap_or(0) < capacity)
            .collect())
    }

    pub async fn slot_has_capacity(
        &self,
        shift: &Schedule,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let booked = self
            .booked_per_slot(shift.doctor_id, shift.date, exclude)
            .await?;
        Ok(booked.get(&slot).copied().unwrap_or(0) < shift.capacity())
    }
}
