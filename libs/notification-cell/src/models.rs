use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Snapshot of the appointment fields a notification needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNotice {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmed,
    CancellationRejected,
    CancellationApproved,
    Cancelled { reason: String },
    Rescheduled {
        previous_date: NaiveDate,
        previous_slot: String,
    },
}

/// Post-commit event emitted by the appointment lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub appointment: AppointmentNotice,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, appointment: AppointmentNotice) -> Self {
        Self { kind, appointment }
    }

    pub fn recipient(&self) -> Option<&str> {
        self.appointment
            .patient_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Email service is not configured")]
    NotConfigured,

    #[error("Email API error ({status}): {message}")]
    EmailApi { status: u16, message: String },

    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
