use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn default_shift_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_shift_end() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Open bounds used by the conflict check when a caller leaves one out.
pub fn day_start() -> NaiveTime {
    NaiveTime::MIN
}

pub fn day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

// ==============================================================================
// SHIFT
// ==============================================================================

/// A doctor's working block in a room on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: Option<i32>,
    pub status: ScheduleStatus,
    pub check_in_time: Option<DateTime<FixedOffset>>,
    pub check_out_time: Option<DateTime<FixedOffset>>,
    pub notes: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl Schedule {
    /// Patients per slot. Unset or non-positive capacity means one.
    pub fn capacity(&self) -> usize {
        match self.max_patients {
            Some(n) if n > 0 => n as usize,
            _ => 1,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    InProgress,
    Late,
    Completed,
    LeftEarly,
    Absent,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Late => "late",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::LeftEarly => "left_early",
            ScheduleStatus::Absent => "absent",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses the absence sweep never overrides.
    pub fn is_closed(&self) -> bool {
        matches!(self, ScheduleStatus::Absent | ScheduleStatus::Cancelled)
    }

    pub const OPEN: [ScheduleStatus; 5] = [
        ScheduleStatus::Scheduled,
        ScheduleStatus::InProgress,
        ScheduleStatus::Late,
        ScheduleStatus::Completed,
        ScheduleStatus::LeftEarly,
    ];

    pub const ON_SHIFT: [ScheduleStatus; 2] = [ScheduleStatus::InProgress, ScheduleStatus::Late];
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// WRITE MODELS
// ==============================================================================

/// Column values written on insert and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleFields {
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: Option<i32>,
    pub notes: Option<String>,
}

/// Create/update payload. Fields are optional so that missing ones can be
/// reported by name instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub room_id: Option<Uuid>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_patients: Option<i32>,
    pub notes: Option<String>,
}

impl ScheduleRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.doctor_id.is_none() {
            missing.push("doctor_id");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.room_id.is_none() {
            missing.push("room_id");
        }
        missing
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub schedules: Vec<ScheduleRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub schedule_ids: Vec<Uuid>,
}

// ==============================================================================
// READ MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleFilter {
    pub doctor_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ScheduleFilter {
    /// A `start_date` on its own selects that single day.
    pub fn upper_bound(&self) -> Option<NaiveDate> {
        self.end_date.or(self.start_date)
    }

    pub fn matches(&self, schedule: &Schedule) -> bool {
        self.doctor_id.map_or(true, |id| schedule.doctor_id == id)
            && self.start_date.map_or(true, |d| schedule.date >= d)
            && self.upper_bound().map_or(true, |d| schedule.date <= d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStats {
    pub total: usize,
    pub by_status: BTreeMap<ScheduleStatus, usize>,
    pub by_date: BTreeMap<NaiveDate, usize>,
}

impl ScheduleStats {
    pub fn from_schedules(schedules: &[Schedule]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut by_date = BTreeMap::new();
        for schedule in schedules {
            *by_status.entry(schedule.status).or_insert(0) += 1;
            *by_date.entry(schedule.date).or_insert(0) += 1;
        }
        Self {
            total: schedules.len(),
            by_status,
            by_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkCreateOutcome {
    pub created: Vec<Schedule>,
    pub errors: Vec<RowError>,
}

impl BulkCreateOutcome {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSweepSummary {
    pub marked_absent: usize,
    pub marked_completed: usize,
    pub failed: Vec<SweepFailure>,
}
