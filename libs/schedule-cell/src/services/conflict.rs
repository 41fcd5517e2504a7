use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::models::{day_end, day_start, Schedule};
use crate::repository::ScheduleRepository;

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share time.
pub fn ranges_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[derive(Clone)]
pub struct ConflictChecker {
    schedules: Arc<dyn ScheduleRepository>,
}

impl ConflictChecker {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    /// First shift on `date` for the same doctor or room whose range overlaps
    /// the proposed one. Missing bounds cover the whole day.
    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        room_id: Uuid,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        exclude_id: Option<Uuid>,
    ) -> Result<Option<Schedule>, ScheduleError> {
        let start = start_time.unwrap_or_else(day_start);
        let end = end_time.unwrap_or_else(day_end);

        debug!(
            "Checking shift conflicts for doctor {} / room {} on {} ({} - {})",
            doctor_id, room_id, date, start, end
        );

        let candidates = self
            .schedules
            .list_on_date_for_doctor_or_room(date, doctor_id, room_id)
            .await?;

        let conflict = candidates.into_iter().find(|existing| {
            Some(existing.id) != exclude_id
                && ranges_overlap(existing.start_time, existing.end_time, start, end)
        });

        if let Some(ref existing) = conflict {
            warn!(
                "Shift conflict on {}: overlaps schedule {} (doctor {}, room {})",
                date, existing.id, existing.doctor_id, existing.room_id
            );
        }

        Ok(conflict)
    }
}
