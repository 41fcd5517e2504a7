use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{eq, in_list};
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{Schedule, ScheduleFields, ScheduleFilter, ScheduleStatus};

const TABLE: &str = "doctor_schedules";
const DOCTOR_DATE_KEY: &str = "doctor_schedules_doctor_date_key";

/// Storage for shifts. New rows start as `scheduled`. Conditional writes
/// return `None` when no row matched their precondition.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn insert(&self, fields: &ScheduleFields) -> Result<Schedule, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Schedule>, DatabaseError>;

    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Schedule>, DatabaseError>;

    /// Shifts on `date` belonging to the doctor or held in the room.
    async fn list_on_date_for_doctor_or_room(
        &self,
        date: NaiveDate,
        doctor_id: Uuid,
        room_id: Uuid,
    ) -> Result<Vec<Schedule>, DatabaseError>;

    /// Ordered by date, then start time.
    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, DatabaseError>;

    async fn update(
        &self,
        id: Uuid,
        fields: &ScheduleFields,
    ) -> Result<Option<Schedule>, DatabaseError>;

    /// Sets the check-in only while none is recorded.
    async fn record_check_in(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError>;

    /// Sets the check-out only after a check-in and while none is recorded.
    async fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError>;

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError>;

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, DatabaseError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store with the same `(doctor_id, date)` uniqueness as the table.
#[derive(Default)]
pub struct InMemoryScheduleRepository {
    rows: RwLock<HashMap<Uuid, Schedule>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(
        rows: &HashMap<Uuid, Schedule>,
        fields: &ScheduleFields,
        except: Option<Uuid>,
    ) -> Result<(), DatabaseError> {
        let taken = rows.values().any(|s| {
            Some(s.id) != except && s.doctor_id == fields.doctor_id && s.date == fields.date
        });
        if taken {
            return Err(DatabaseError::UniqueViolation(DOCTOR_DATE_KEY.to_string()));
        }
        Ok(())
    }
}

fn sorted(mut schedules: Vec<Schedule>) -> Vec<Schedule> {
    schedules.sort_by(|a, b| (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id)));
    schedules
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn insert(&self, fields: &ScheduleFields) -> Result<Schedule, DatabaseError> {
        let mut rows = self.rows.write().await;
        Self::ensure_unique(&rows, fields, None)?;

        let schedule = Schedule {
            id: Uuid::new_v4(),
            doctor_id: fields.doctor_id,
            room_id: fields.room_id,
            date: fields.date,
            start_time: fields.start_time,
            end_time: fields.end_time,
            max_patients: fields.max_patients,
            status: ScheduleStatus::Scheduled,
            check_in_time: None,
            check_out_time: None,
            notes: fields.notes.clone(),
            created_at: Utc::now().into(),
        };
        rows.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Schedule>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(sorted(ids.iter().filter_map(|id| rows.get(id).cloned()).collect()))
    }

    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Schedule>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.doctor_id == doctor_id && s.date == date)
            .cloned())
    }

    async fn list_on_date_for_doctor_or_room(
        &self,
        date: NaiveDate,
        doctor_id: Uuid,
        room_id: Uuid,
    ) -> Result<Vec<Schedule>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(sorted(
            rows.values()
                .filter(|s| s.date == date && (s.doctor_id == doctor_id || s.room_id == room_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(sorted(rows.values().filter(|s| filter.matches(s)).cloned().collect()))
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ScheduleFields,
    ) -> Result<Option<Schedule>, DatabaseError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&id) {
            return Ok(None);
        }
        Self::ensure_unique(&rows, fields, Some(id))?;

        Ok(rows.get_mut(&id).map(|s| {
            s.doctor_id = fields.doctor_id;
            s.room_id = fields.room_id;
            s.date = fields.date;
            s.start_time = fields.start_time;
            s.end_time = fields.end_time;
            s.max_patients = fields.max_patients;
            s.notes = fields.notes.clone();
            s.clone()
        }))
    }

    async fn record_check_in(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .get_mut(&id)
            .filter(|s| s.check_in_time.is_none())
            .map(|s| {
                s.check_in_time = Some(at);
                s.status = status;
                s.clone()
            }))
    }

    async fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .get_mut(&id)
            .filter(|s| s.check_in_time.is_some() && s.check_out_time.is_none())
            .map(|s| {
                s.check_out_time = Some(at);
                s.status = status;
                s.clone()
            }))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .get_mut(&id)
            .filter(|s| from.contains(&s.status))
            .map(|s| {
                s.status = to;
                s.clone()
            }))
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, DatabaseError> {
        let mut rows = self.rows.write().await;
        Ok(ids.iter().filter_map(|id| rows.remove(id)).count())
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseScheduleRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first(&self, query: &str) -> Result<Option<Schedule>, DatabaseError> {
        let rows: Vec<Schedule> = self.supabase.select(TABLE, query).await?;
        Ok(rows.into_iter().next())
    }

    async fn patch(&self, filter: &str, body: Value) -> Result<Option<Schedule>, DatabaseError> {
        let rows: Vec<Schedule> = self.supabase.update(TABLE, filter, body).await?;
        Ok(rows.into_iter().next())
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    #[serde(flatten)]
    fields: &'a ScheduleFields,
    status: ScheduleStatus,
}

const ORDER: &str = "order=date.asc,start_time.asc";

#[async_trait]
impl ScheduleRepository for SupabaseScheduleRepository {
    async fn insert(&self, fields: &ScheduleFields) -> Result<Schedule, DatabaseError> {
        let body = serde_json::to_value(InsertRow {
            fields,
            status: ScheduleStatus::Scheduled,
        })?;
        let rows: Vec<Schedule> = self.supabase.insert(TABLE, body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound("Insert returned no schedule".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError> {
        self.first(&format!("id={}", eq(id))).await
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Schedule>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("id={}&{}", in_list(ids), ORDER);
        self.supabase.select(TABLE, &query).await
    }

    async fn find_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Schedule>, DatabaseError> {
        self.first(&format!("doctor_id={}&date={}&limit=1", eq(doctor_id), eq(date)))
            .await
    }

    async fn list_on_date_for_doctor_or_room(
        &self,
        date: NaiveDate,
        doctor_id: Uuid,
        room_id: Uuid,
    ) -> Result<Vec<Schedule>, DatabaseError> {
        let query = format!(
            "date={}&or=(doctor_id.eq.{},room_id.eq.{})&{}",
            eq(date),
            doctor_id,
            room_id,
            ORDER
        );
        debug!("Loading shifts for conflict check: {}", query);
        self.supabase.select(TABLE, &query).await
    }

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, DatabaseError> {
        let mut query = Vec::new();
        if let Some(doctor_id) = filter.doctor_id {
            query.push(format!("doctor_id={}", eq(doctor_id)));
        }
        if let Some(start) = filter.start_date {
            query.push(format!("date=gte.{}", start));
        }
        if let Some(end) = filter.upper_bound() {
            query.push(format!("date=lte.{}", end));
        }
        query.push(ORDER.to_string());

        self.supabase.select(TABLE, &query.join("&")).await
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ScheduleFields,
    ) -> Result<Option<Schedule>, DatabaseError> {
        self.patch(&format!("id={}", eq(id)), serde_json::to_value(fields)?)
            .await
    }

    async fn record_check_in(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        self.patch(
            &format!("id={}&check_in_time=is.null", eq(id)),
            json!({ "check_in_time": at, "status": status }),
        )
        .await
    }

    async fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<FixedOffset>,
        status: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        self.patch(
            &format!("id={}&check_in_time=not.is.null&check_out_time=is.null", eq(id)),
            json!({ "check_out_time": at, "status": status }),
        )
        .await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
    ) -> Result<Option<Schedule>, DatabaseError> {
        self.patch(
            &format!("id={}&status={}", eq(id), in_list(from)),
            json!({ "status": to }),
        )
        .await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed: Vec<Value> = self
            .supabase
            .delete(TABLE, &format!("id={}", in_list(ids)))
            .await?;
        Ok(removed.len())
    }
}
