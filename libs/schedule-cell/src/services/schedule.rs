use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::auth::User;
use shared_utils::clock::Clock;

use crate::error::ScheduleError;
use crate::models::{
    default_shift_end, default_shift_start, BulkCreateOutcome, RowError, Schedule,
    ScheduleFields, ScheduleFilter, ScheduleRequest, ScheduleStats, ScheduleStatus,
    StatusSweepSummary, SweepFailure,
};
use crate::repository::ScheduleRepository;
use crate::services::conflict::ConflictChecker;

/// Days ahead covered by a doctor's upcoming-shift listing.
pub const UPCOMING_WINDOW_DAYS: i64 = 14;

pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    conflicts: ConflictChecker,
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            conflicts: ConflictChecker::new(schedules.clone()),
            schedules,
            clock,
        }
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: ScheduleRequest) -> Result<Schedule, ScheduleError> {
        let fields = self.prepare_new(&request).await?;
        let created = self.insert(&fields).await?;

        info!(
            "Created schedule {} for doctor {} on {}",
            created.id, created.doctor_id, created.date
        );
        Ok(created)
    }

    /// Rows are independent: each failure is recorded against its index and
    /// the batch continues. Rows created earlier take part in later conflict
    /// checks.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn bulk_create(
        &self,
        rows: Vec<ScheduleRequest>,
    ) -> Result<BulkCreateOutcome, ScheduleError> {
        if rows.is_empty() {
            return Err(ScheduleError::ValidationError(
                "Schedule list must not be empty".to_string(),
            ));
        }

        let mut created = Vec::new();
        let mut errors = Vec::new();

        for (index, request) in rows.iter().enumerate() {
            let result = match self.prepare_new(request).await {
                Ok(fields) => self.insert(&fields).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(schedule) => created.push(schedule),
                Err(e) => {
                    debug!("Bulk row {} rejected: {}", index, e);
                    errors.push(RowError {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!("Bulk created {}/{} schedules", created.len(), rows.len());

        if created.is_empty() {
            return Err(ScheduleError::NothingCreated(errors));
        }

        Ok(BulkCreateOutcome { created, errors })
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: ScheduleRequest,
    ) -> Result<Schedule, ScheduleError> {
        let (doctor_id, date, room_id) = required(&request)?;

        let existing = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(ScheduleError::NotFound)?;

        if date < self.clock.today() {
            return Err(ScheduleError::PastDate("update"));
        }

        let fields = ScheduleFields {
            doctor_id,
            room_id,
            date,
            start_time: request.start_time.unwrap_or(existing.start_time),
            end_time: request.end_time.unwrap_or(existing.end_time),
            max_patients: request.max_patients.or(existing.max_patients),
            notes: request.notes.clone().or(existing.notes.clone()),
        };

        if fields.start_time >= fields.end_time {
            return Err(ScheduleError::InvalidTimeRange);
        }

        let conflict = self
            .conflicts
            .has_conflict(
                doctor_id,
                date,
                room_id,
                Some(fields.start_time),
                Some(fields.end_time),
                Some(id),
            )
            .await?;
        if conflict.is_some() {
            return Err(ScheduleError::Conflict(date));
        }

        let updated = self
            .schedules
            .update(id, &fields)
            .await
            .map_err(|e| conflict_or(e, date))?
            .ok_or(ScheduleError::NotFound)?;

        info!("Updated schedule {}", id);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ScheduleError> {
        let schedule = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(ScheduleError::NotFound)?;

        if schedule.date < self.clock.today() {
            return Err(ScheduleError::PastDate("delete"));
        }

        self.schedules.delete_many(&[id]).await?;
        info!("Deleted schedule {}", id);
        Ok(())
    }

    /// All-or-nothing: a single past shift among the ids rejects the batch.
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn bulk_delete(&self, ids: Vec<Uuid>) -> Result<usize, ScheduleError> {
        if ids.is_empty() {
            return Err(ScheduleError::ValidationError(
                "Schedule id list must not be empty".to_string(),
            ));
        }

        let found = self.schedules.find_by_ids(&ids).await?;
        if found.is_empty() {
            return Err(ScheduleError::NotFound);
        }

        let today = self.clock.today();
        let past: Vec<(Uuid, NaiveDate)> = found
            .iter()
            .filter(|s| s.date < today)
            .map(|s| (s.id, s.date))
            .collect();
        if !past.is_empty() {
            warn!("Bulk delete rejected: {} schedules are in the past", past.len());
            return Err(ScheduleError::PastSchedules(past));
        }

        let found_ids: Vec<Uuid> = found.iter().map(|s| s.id).collect();
        let deleted = self.schedules.delete_many(&found_ids).await?;

        info!("Bulk deleted {} schedules", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn check_in(&self, id: Uuid, actor: &User) -> Result<Schedule, ScheduleError> {
        let schedule = self.assigned_schedule(id, actor, "check in to").await?;

        let now = self.clock.now();
        if schedule.date != now.date_naive() {
            return Err(ScheduleError::GuardViolation(
                "Check-in is only allowed on the day of the shift".to_string(),
            ));
        }
        if schedule.check_in_time.is_some() {
            return Err(already_checked_in());
        }

        let status = if now.naive_local() <= schedule.starts_at() {
            ScheduleStatus::InProgress
        } else {
            ScheduleStatus::Late
        };

        let updated = self
            .schedules
            .record_check_in(id, now, status)
            .await?
            .ok_or_else(already_checked_in)?;

        info!("Doctor {} checked in to schedule {} ({})", actor.id, id, status);
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn check_out(&self, id: Uuid, actor: &User) -> Result<Schedule, ScheduleError> {
        let schedule = self.assigned_schedule(id, actor, "check out of").await?;

        if schedule.check_in_time.is_none() {
            return Err(ScheduleError::GuardViolation("Not checked in yet".to_string()));
        }
        if schedule.check_out_time.is_some() {
            return Err(already_checked_out());
        }

        let now = self.clock.now();
        let status = if now.naive_local() >= schedule.ends_at() {
            ScheduleStatus::Completed
        } else {
            ScheduleStatus::LeftEarly
        };

        let updated = self
            .schedules
            .record_check_out(id, now, status)
            .await?
            .ok_or_else(already_checked_out)?;

        info!("Doctor {} checked out of schedule {} ({})", actor.id, id, status);
        Ok(updated)
    }

    /// Past shifts never checked in become `absent`. Today's shifts that have
    /// ended become `completed` when the doctor is still checked in, `absent`
    /// when they never checked in.
    #[instrument(skip(self))]
    pub async fn auto_update_statuses(&self) -> Result<StatusSweepSummary, ScheduleError> {
        let now = self.clock.local_now();
        let today = now.date();
        let mut summary = StatusSweepSummary::default();

        let past = self
            .schedules
            .list(&ScheduleFilter {
                end_date: today.pred_opt(),
                ..Default::default()
            })
            .await?;

        for schedule in past
            .iter()
            .filter(|s| s.check_in_time.is_none() && !s.status.is_closed())
        {
            self.sweep_one(schedule, &ScheduleStatus::OPEN, ScheduleStatus::Absent, &mut summary)
                .await;
        }

        let todays = self
            .schedules
            .list(&ScheduleFilter {
                start_date: Some(today),
                end_date: Some(today),
                ..Default::default()
            })
            .await?;

        for schedule in todays.iter().filter(|s| now > s.ends_at()) {
            if schedule.check_in_time.is_some()
                && schedule.check_out_time.is_none()
                && ScheduleStatus::ON_SHIFT.contains(&schedule.status)
            {
                self.sweep_one(
                    schedule,
                    &ScheduleStatus::ON_SHIFT,
                    ScheduleStatus::Completed,
                    &mut summary,
                )
                .await;
            } else if schedule.check_in_time.is_none() && !schedule.status.is_closed() {
                self.sweep_one(
                    schedule,
                    &[ScheduleStatus::Scheduled],
                    ScheduleStatus::Absent,
                    &mut summary,
                )
                .await;
            }
        }

        info!(
            "Schedule status sweep: {} absent, {} completed, {} failed",
            summary.marked_absent,
            summary.marked_completed,
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn sweep_one(
        &self,
        schedule: &Schedule,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
        summary: &mut StatusSweepSummary,
    ) {
        match self.schedules.transition_status(schedule.id, from, to).await {
            Ok(Some(_)) => match to {
                ScheduleStatus::Completed => summary.marked_completed += 1,
                _ => summary.marked_absent += 1,
            },
            Ok(None) => debug!("Schedule {} changed concurrently, skipped", schedule.id),
            Err(e) => {
                warn!("Failed to mark schedule {} as {}: {}", schedule.id, to, e);
                summary.failed.push(SweepFailure {
                    id: schedule.id,
                    message: e.to_string(),
                });
            }
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get(&self, id: Uuid) -> Result<Schedule, ScheduleError> {
        self.schedules
            .find_by_id(id)
            .await?
            .ok_or(ScheduleError::NotFound)
    }

    pub async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, ScheduleError> {
        Ok(self.schedules.list(filter).await?)
    }

    /// The doctor's shifts from today through the next two weeks.
    pub async fn upcoming_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, ScheduleError> {
        let today = self.clock.today();
        self.list(&ScheduleFilter {
            doctor_id: Some(doctor_id),
            start_date: Some(today),
            end_date: Some(today + Duration::days(UPCOMING_WINDOW_DAYS)),
        })
        .await
    }

    /// Everyone working on `date`, ordered by start time.
    pub async fn on_date(&self, date: NaiveDate) -> Result<Vec<Schedule>, ScheduleError> {
        self.list(&ScheduleFilter {
            start_date: Some(date),
            end_date: Some(date),
            ..Default::default()
        })
        .await
    }

    pub async fn stats(&self, filter: &ScheduleFilter) -> Result<ScheduleStats, ScheduleError> {
        let schedules = self.list(filter).await?;
        Ok(ScheduleStats::from_schedules(&schedules))
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn prepare_new(&self, request: &ScheduleRequest) -> Result<ScheduleFields, ScheduleError> {
        let (doctor_id, date, room_id) = required(request)?;

        if date < self.clock.today() {
            return Err(ScheduleError::PastDate("create"));
        }

        let start_time = request.start_time.unwrap_or_else(default_shift_start);
        let end_time = request.end_time.unwrap_or_else(default_shift_end);
        if start_time >= end_time {
            return Err(ScheduleError::InvalidTimeRange);
        }

        let conflict = self
            .conflicts
            .has_conflict(doctor_id, date, room_id, Some(start_time), Some(end_time), None)
            .await?;
        if conflict.is_some() {
            return Err(ScheduleError::Conflict(date));
        }

        Ok(ScheduleFields {
            doctor_id,
            room_id,
            date,
            start_time,
            end_time,
            max_patients: request.max_patients,
            notes: request.notes.clone(),
        })
    }

    async fn insert(&self, fields: &ScheduleFields) -> Result<Schedule, ScheduleError> {
        self.schedules
            .insert(fields)
            .await
            .map_err(|e| conflict_or(e, fields.date))
    }

    async fn assigned_schedule(
        &self,
        id: Uuid,
        actor: &User,
        action: &'static str,
    ) -> Result<Schedule, ScheduleError> {
        let schedule = self.get(id).await?;
        if schedule.doctor_id != actor.id {
            warn!("User {} tried to {} schedule {}", actor.id, action, id);
            return Err(ScheduleError::NotAssignedDoctor(action));
        }
        Ok(schedule)
    }
}

fn required(request: &ScheduleRequest) -> Result<(Uuid, NaiveDate, Uuid), ScheduleError> {
    match (request.doctor_id, request.date, request.room_id) {
        (Some(doctor_id), Some(date), Some(room_id)) => Ok((doctor_id, date, room_id)),
        _ => Err(ScheduleError::MissingFields(request.missing_fields())),
    }
}

fn conflict_or(err: DatabaseError, date: NaiveDate) -> ScheduleError {
    if err.is_unique_violation() {
        ScheduleError::Conflict(date)
    } else {
        ScheduleError::Database(err)
    }
}

fn already_checked_in() -> ScheduleError {
    ScheduleError::GuardViolation("Already checked in".to_string())
}

fn already_checked_out() -> ScheduleError {
    ScheduleError::GuardViolation("Already checked out".to_string())
}
