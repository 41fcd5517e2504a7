use axum::http::StatusCode;
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

use crate::models::RowError;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule not found")]
    NotFound,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    ValidationError(String),

    #[error("Cannot {0} a schedule for a date in the past")]
    PastDate(&'static str),

    #[error("Start time must be before end time")]
    InvalidTimeRange,

    #[error("Schedule conflict: the doctor or room already has an overlapping shift on {0}")]
    Conflict(NaiveDate),

    #[error("Only the assigned doctor can {0} this shift")]
    NotAssignedDoctor(&'static str),

    #[error("{0}")]
    GuardViolation(String),

    #[error("Cannot delete schedules that are already in the past")]
    PastSchedules(Vec<(Uuid, NaiveDate)>),

    #[error("No schedules were created")]
    NothingCreated(Vec<RowError>),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::NotFound => AppError::NotFound(err.to_string()),
            ScheduleError::MissingFields(_) | ScheduleError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            ScheduleError::PastDate(_)
            | ScheduleError::InvalidTimeRange
            | ScheduleError::GuardViolation(_) => AppError::BadRequest(err.to_string()),
            ScheduleError::Conflict(_) => AppError::Conflict(err.to_string()),
            ScheduleError::NotAssignedDoctor(_) => AppError::Forbidden(err.to_string()),
            ScheduleError::PastSchedules(ref past) => {
                let past_schedules: Vec<_> = past
                    .iter()
                    .map(|(id, date)| json!({ "id": id, "date": date }))
                    .collect();
                AppError::Detailed {
                    status: StatusCode::BAD_REQUEST,
                    message: err.to_string(),
                    details: json!({ "past_schedules": past_schedules }),
                }
            }
            ScheduleError::NothingCreated(ref errors) => AppError::Detailed {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
                details: json!({ "errors": errors }),
            },
            ScheduleError::Database(e) => e.into(),
        }
    }
}
