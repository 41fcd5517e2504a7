use chrono::NaiveDate;
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;

use crate::models::{AppointmentStatus, TimeSlot};
use crate::services::lifecycle::Transition;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Cannot book an appointment for a date in the past")]
    PastDate,

    #[error("Doctor has no shift on {0}")]
    DoctorNotWorking(NaiveDate),

    #[error("{0}")]
    DuplicateBooking(String),

    #[error("Time slot {0} is fully booked")]
    SlotFull(TimeSlot),

    #[error("Cannot {transition} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        transition: Transition,
    },

    #[error("{0}")]
    GuardViolation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Appointment was modified by another request, please retry")]
    ConcurrentModification,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::PastDate
            | AppointmentError::DoctorNotWorking(_)
            | AppointmentError::DuplicateBooking(_)
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::GuardViolation(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::SlotFull(_) | AppointmentError::ConcurrentModification => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            AppointmentError::Database(e) => e.into(),
        }
    }
}
