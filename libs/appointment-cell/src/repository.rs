use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{eq, in_list};
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentChanges, AppointmentQuery, AppointmentStatus, NewAppointment,
    TimeSlot,
};

const TABLE: &str = "appointments";
const LIVE_BOOKING_KEY: &str = "appointments_live_booking_key";

/// Storage for appointments. At most one non-cancelled row may exist per
/// (patient, doctor, date, slot); writes breaking that fail with
/// `DatabaseError::UniqueViolation`.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, row: &NewAppointment) -> Result<Appointment, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// Non-cancelled appointment for exactly this patient, doctor, date and slot.
    async fn find_live_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// Pending appointment for this patient with this doctor on `date`, any slot.
    async fn find_pending_on(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError>;

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError>;

    /// Applies `changes` only while the row is still in one of `expected`.
    async fn update(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(
        rows: &HashMap<Uuid, Appointment>,
        candidate: &Appointment,
    ) -> Result<(), DatabaseError> {
        if candidate.status == AppointmentStatus::Cancelled {
            return Ok(());
        }
        let taken = rows.values().any(|a| {
            a.id != candidate.id
                && a.status != AppointmentStatus::Cancelled
                && a.patient_id == candidate.patient_id
                && a.doctor_id == candidate.doctor_id
                && a.appointment_date == candidate.appointment_date
                && a.time_slot == candidate.time_slot
        });
        if taken {
            return Err(DatabaseError::UniqueViolation(LIVE_BOOKING_KEY.to_string()));
        }
        Ok(())
    }
}

fn sorted(mut appointments: Vec<Appointment>, newest_first: bool) -> Vec<Appointment> {
    if newest_first {
        appointments.sort_by_key(|a| (Reverse(a.appointment_date), a.time_slot, a.created_at, a.id));
    } else {
        appointments.sort_by_key(|a| (a.appointment_date, a.time_slot, a.created_at, a.id));
    }
    appointments
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, row: &NewAppointment) -> Result<Appointment, DatabaseError> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: row.patient_id,
            patient_name: row.patient_name.clone(),
            patient_dob: row.patient_dob,
            patient_phone: row.patient_phone.clone(),
            patient_email: row.patient_email.clone(),
            patient_gender: row.patient_gender.clone(),
            patient_address: row.patient_address.clone(),
            doctor_id: row.doctor_id,
            department_id: row.department_id,
            schedule_id: row.schedule_id,
            appointment_date: row.appointment_date,
            time_slot: row.time_slot,
            reason: row.reason.clone(),
            status: row.status,
            cancel_reason: None,
            cancel_requested_at: None,
            cancel_confirmed_at: None,
            created_at: Utc::now().into(),
        };

        let mut rows = self.rows.write().await;
        Self::ensure_unique(&rows, &appointment)?;
        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_live_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|a| {
                Some(a.id) != exclude
                    && a.status != AppointmentStatus::Cancelled
                    && a.patient_id == patient_id
                    && a.doctor_id == doctor_id
                    && a.appointment_date == date
                    && a.time_slot == slot
            })
            .cloned())
    }

    async fn find_pending_on(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|a| {
                Some(a.id) != exclude
                    && a.status == AppointmentStatus::Pending
                    && a.patient_id == patient_id
                    && a.doctor_id == doctor_id
                    && a.appointment_date == date
            })
            .cloned())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(sorted(
            rows.values().filter(|a| query.matches(a)).cloned().collect(),
            query.newest_first,
        ))
    }

    async fn update(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut rows = self.rows.write().await;
        let Some(current) = rows.get(&id).filter(|a| expected.contains(&a.status)) else {
            return Ok(None);
        };

        let mut candidate = current.clone();
        changes.apply_to(&mut candidate);
        Self::ensure_unique(&rows, &candidate)?;

        rows.insert(id, candidate.clone());
        Ok(Some(candidate))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first(&self, query: &str) -> Result<Option<Appointment>, DatabaseError> {
        let rows: Vec<Appointment> = self.supabase.select(TABLE, query).await?;
        Ok(rows.into_iter().next())
    }
}

fn exclude_filter(exclude: Option<Uuid>) -> String {
    exclude
        .map(|id| format!("&id=neq.{}", id))
        .unwrap_or_default()
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, row: &NewAppointment) -> Result<Appointment, DatabaseError> {
        let rows: Vec<Appointment> = self
            .supabase
            .insert(TABLE, serde_json::to_value(row)?)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound("Insert returned no appointment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        self.first(&format!("id={}", eq(id))).await
    }

    async fn find_live_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let query = format!(
            "patient_id={}&doctor_id={}&appointment_date={}&time_slot={}&status=neq.cancelled{}&limit=1",
            eq(patient_id),
            eq(doctor_id),
            eq(date),
            eq(slot),
            exclude_filter(exclude)
        );
        self.first(&query).await
    }

    async fn find_pending_on(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let query = format!(
            "patient_id={}&doctor_id={}&appointment_date={}&status=eq.pending{}&limit=1",
            eq(patient_id),
            eq(doctor_id),
            eq(date),
            exclude_filter(exclude)
        );
        self.first(&query).await
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut parts = Vec::new();
        if let Some(patient_id) = query.patient_id {
            parts.push(format!("patient_id={}", eq(patient_id)));
        }
        if let Some(doctor_id) = query.doctor_id {
            parts.push(format!("doctor_id={}", eq(doctor_id)));
        }
        if let Some(date) = query.date {
            parts.push(format!("appointment_date={}", eq(date)));
        }
        if !query.statuses.is_empty() {
            parts.push(format!("status={}", in_list(&query.statuses)));
        }
        let direction = if query.newest_first { "desc" } else { "asc" };
        parts.push(format!(
            "order=appointment_date.{},time_slot.asc,created_at.asc",
            direction
        ));

        let query = parts.join("&");
        debug!("Listing appointments: {}", query);
        self.supabase.select(TABLE, &query).await
    }

    async fn update(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let filter = format!("id={}&status={}", eq(id), in_list(expected));
        let rows: Vec<Appointment> = self
            .supabase
            .update(TABLE, &filter, serde_json::to_value(changes)?)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let removed: Vec<Value> = self
            .supabase
            .delete(TABLE, &format!("id={}", eq(id)))
            .await?;
        Ok(!removed.is_empty())
    }
}
