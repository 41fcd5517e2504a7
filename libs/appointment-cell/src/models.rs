use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notification_cell::AppointmentNotice;
use shared_models::auth::User;

/// Minutes after a slot starts before an unattended appointment expires.
pub const GRACE_PERIOD_MINUTES: i64 = 30;

pub const AUTO_CANCEL_REASON: &str = "Automatically cancelled: appointment time has passed";
pub const DOCTOR_CANCEL_REASON: &str = "Cancelled by doctor";

// ==============================================================================
// TIME SLOTS
// ==============================================================================

/// The six bookable ranges of a clinic day, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "08:00-09:00")]
    Slot0800,
    #[serde(rename = "09:00-10:00")]
    Slot0900,
    #[serde(rename = "10:00-11:00")]
    Slot1000,
    #[serde(rename = "13:30-14:30")]
    Slot1330,
    #[serde(rename = "14:30-15:30")]
    Slot1430,
    #[serde(rename = "15:30-16:30")]
    Slot1530,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 6] = [
        TimeSlot::Slot0800,
        TimeSlot::Slot0900,
        TimeSlot::Slot1000,
        TimeSlot::Slot1330,
        TimeSlot::Slot1430,
        TimeSlot::Slot1530,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Slot0800 => "08:00-09:00",
            TimeSlot::Slot0900 => "09:00-10:00",
            TimeSlot::Slot1000 => "10:00-11:00",
            TimeSlot::Slot1330 => "13:30-14:30",
            TimeSlot::Slot1430 => "14:30-15:30",
            TimeSlot::Slot1530 => "15:30-16:30",
        }
    }

    fn start_hm(&self) -> (u32, u32) {
        match self {
            TimeSlot::Slot0800 => (8, 0),
            TimeSlot::Slot0900 => (9, 0),
            TimeSlot::Slot1000 => (10, 0),
            TimeSlot::Slot1330 => (13, 30),
            TimeSlot::Slot1430 => (14, 30),
            TimeSlot::Slot1530 => (15, 30),
        }
    }

    pub fn start_time(&self) -> NaiveTime {
        let (h, m) = self.start_hm();
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTimeSlot(pub String);

impl fmt::Display for UnknownTimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown time slot: {}", self.0)
    }
}

impl FromStr for TimeSlot {
    type Err = UnknownTimeSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::ALL
            .into_iter()
            .find(|slot| slot.label() == s.trim())
            .ok_or_else(|| UnknownTimeSlot(s.to_string()))
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CancelRequested,
    InTreatment,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::CancelRequested => "cancel_requested",
            AppointmentStatus::InTreatment => "in_treatment",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Every status that still holds a place in a slot.
    pub const LIVE: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CancelRequested,
        AppointmentStatus::InTreatment,
        AppointmentStatus::Completed,
    ];

    /// Statuses the auto-expiry sweep acts on.
    pub const EXPIRABLE: [AppointmentStatus; 2] =
        [AppointmentStatus::Pending, AppointmentStatus::Confirmed];
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_dob: Option<NaiveDate>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_gender: Option<String>,
    pub patient_address: Option<String>,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub cancel_reason: Option<String>,
    pub cancel_requested_at: Option<DateTime<FixedOffset>>,
    pub cancel_confirmed_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl Appointment {
    pub fn slot_start(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.time_slot.start_time())
    }

    /// Wall-clock moment after which the appointment counts as overdue.
    pub fn expires_at(&self) -> NaiveDateTime {
        self.slot_start() + Duration::minutes(GRACE_PERIOD_MINUTES)
    }

    pub fn is_patient(&self, user: &User) -> bool {
        self.patient_id == user.id
    }

    pub fn is_assigned_doctor(&self, user: &User) -> bool {
        self.doctor_id == user.id
    }

    pub fn is_participant(&self, user: &User) -> bool {
        self.is_patient(user) || self.is_assigned_doctor(user)
    }

    pub fn notice(&self) -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: self.id,
            patient_name: self.patient_name.clone(),
            patient_email: self.patient_email.clone(),
            doctor_id: self.doctor_id,
            appointment_date: self.appointment_date,
            time_slot: self.time_slot.label().to_string(),
        }
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Defaults to the caller when a patient books for themselves.
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub patient_name: String,
    pub patient_dob: Option<NaiveDate>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_gender: Option<String>,
    pub patient_address: Option<String>,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_name: Option<String>,
    pub patient_dob: Option<NaiveDate>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_gender: Option<String>,
    pub patient_address: Option<String>,
    pub department_id: Option<Uuid>,
    pub reason: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub time_slot: Option<TimeSlot>,
    pub status: Option<AppointmentStatus>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// STORAGE MODELS
// ==============================================================================

/// Row written on booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_dob: Option<NaiveDate>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_gender: Option<String>,
    pub patient_address: Option<String>,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_dob: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<TimeSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_requested_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_confirmed_at: Option<DateTime<FixedOffset>>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut appointment.patient_name, &self.patient_name);
        set_opt(&mut appointment.patient_dob, &self.patient_dob);
        set_opt(&mut appointment.patient_phone, &self.patient_phone);
        set_opt(&mut appointment.patient_email, &self.patient_email);
        set_opt(&mut appointment.patient_gender, &self.patient_gender);
        set_opt(&mut appointment.patient_address, &self.patient_address);
        set_opt(&mut appointment.department_id, &self.department_id);
        set_opt(&mut appointment.schedule_id, &self.schedule_id);
        set_opt(&mut appointment.reason, &self.reason);
        set(&mut appointment.appointment_date, &self.appointment_date);
        set(&mut appointment.time_slot, &self.time_slot);
        set(&mut appointment.status, &self.status);
        set_opt(&mut appointment.cancel_reason, &self.cancel_reason);
        set_opt(&mut appointment.cancel_requested_at, &self.cancel_requested_at);
        set_opt(&mut appointment.cancel_confirmed_at, &self.cancel_confirmed_at);
    }
}

/// Read filter. Results are ordered by date (newest first when asked), then slot.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub statuses: Vec<AppointmentStatus>,
    pub newest_first: bool,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.date.map_or(true, |d| appointment.appointment_date == d)
            && (self.statuses.is_empty() || self.statuses.contains(&appointment.status))
    }
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityCheck {
    pub available: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelledAppointment {
    pub id: Uuid,
    pub patient_name: String,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryFailure {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoCancelSummary {
    pub cancelled_count: usize,
    pub cancelled: Vec<CancelledAppointment>,
    pub failed: Vec<ExpiryFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slots_use_their_labels_on_the_wire() {
        assert_eq!(serde_json::to_value(TimeSlot::Slot1330).unwrap(), json!("13:30-14:30"));
        let parsed: TimeSlot = serde_json::from_value(json!("15:30-16:30")).unwrap();
        assert_eq!(parsed, TimeSlot::Slot1530);
        assert!(serde_json::from_value::<TimeSlot>(json!("11:00-12:00")).is_err());
    }

    #[test]
    fn slots_are_in_chronological_order() {
        let starts: Vec<NaiveTime> = TimeSlot::ALL.iter().map(|s| s.start_time()).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(TimeSlot::Slot1430.start_time(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn slot_labels_parse() {
        assert_eq!("09:00-10:00".parse::<TimeSlot>(), Ok(TimeSlot::Slot0900));
        assert!("9-10".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::CancelRequested).unwrap(),
            json!("cancel_requested")
        );
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(!AppointmentStatus::InTreatment.is_terminal());
    }

    #[test]
    fn changes_skip_unset_columns() {
        let changes = AppointmentChanges {
            reason: Some("follow-up".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&changes).unwrap(), json!({ "reason": "follow-up" }));
        assert!(AppointmentChanges::default().is_empty());
        assert!(!changes.is_empty());
    }
}
