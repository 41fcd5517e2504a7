use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_admin, require_staff};

use crate::models::{
    Appointment, AppointmentStatus, AvailabilityQuery, BookAppointmentRequest, CancelRequest,
    StatusFilter, UpdateAppointmentRequest,
};
use crate::router::AppointmentState;

// ==============================================================================
// ACCESS RULES
// ==============================================================================

fn ensure_participant_or_admin(appointment: &Appointment, user: &User) -> Result<(), AppError> {
    if user.is_admin() || appointment.is_participant(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to access this appointment".to_string(),
        ))
    }
}

fn ensure_assigned_doctor_or_admin(appointment: &Appointment, user: &User) -> Result<(), AppError> {
    if user.is_admin() || (user.is_doctor() && appointment.is_assigned_doctor(user)) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the assigned doctor or an admin can do this".to_string(),
        ))
    }
}

fn ensure_owning_patient_or_admin(appointment: &Appointment, user: &User) -> Result<(), AppError> {
    if user.is_admin() || appointment.is_patient(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the patient who booked this appointment can do this".to_string(),
        ))
    }
}

fn ok(message: &str, appointment: Appointment) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": appointment
    }))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Public: no authentication required.
pub async fn available_time_slots(
    State(state): State<Arc<AppointmentState>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let slots = state.service().available_slots(doctor_id, date).await?;

    Ok(Json(json!({
        "success": true,
        "data": slots
    })))
}

pub async fn check_availability(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let patient_id = query.patient_id.unwrap_or(user.id);

    let check = state
        .service()
        .check_availability(patient_id, query.doctor_id, query.appointment_date, query.time_slot)
        .await?;

    Ok(Json(json!({
        "success": true,
        "available": check.available,
        "message": check.message
    })))
}

// ==============================================================================
// BOOKING AND UPDATES
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.service().book(request, &user).await?;

    Ok((StatusCode::CREATED, ok("Appointment booked", appointment)))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.service().get(appointment_id).await?;
    ensure_participant_or_admin(&appointment, &user)?;

    Ok(Json(json!({ "success": true, "data": appointment })))
}

pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    let current = service.get(appointment_id).await?;
    ensure_participant_or_admin(&current, &user)?;

    let updated = service.update(appointment_id, request, &user).await?;

    Ok(ok("Appointment updated", updated))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    state.service().delete(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.confirm(appointment_id).await?;
    Ok(ok("Appointment confirmed", appointment))
}

pub async fn start_treatment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.start_treatment(appointment_id).await?;
    Ok(ok("Treatment started", appointment))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.complete(appointment_id).await?;
    Ok(ok("Appointment completed", appointment))
}

pub async fn request_cancellation(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_owning_patient_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.request_cancel(appointment_id, request.reason).await?;
    Ok(ok("Cancellation requested", appointment))
}

pub async fn approve_cancellation(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.approve_cancel(appointment_id).await?;
    Ok(ok("Cancellation approved", appointment))
}

pub async fn reject_cancellation(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.reject_cancel(appointment_id).await?;
    Ok(ok("Cancellation request rejected", appointment))
}

pub async fn doctor_cancel(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let service = state.service();
    ensure_assigned_doctor_or_admin(&service.get(appointment_id).await?, &user)?;

    let appointment = service.doctor_cancel(appointment_id, request.reason).await?;
    Ok(ok("Appointment cancelled", appointment))
}

pub async fn auto_cancel_overdue(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let summary = state.service().auto_cancel_overdue().await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Cancelled {} overdue appointments", summary.cancelled_count),
        "data": summary
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

pub async fn list_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let appointments = state.service().list_all().await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}

pub async fn doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Value>, AppError> {
    if !user.is_self_or_admin(doctor_id) {
        return Err(AppError::Forbidden(
            "Doctors can only view their own appointments".to_string(),
        ));
    }

    let appointments = state.service().by_doctor(doctor_id, filter.status).await?;

    Ok(Json(json!({ "success": true, "data": appointments })))
}

pub async fn doctor_appointments_on_date(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    if !user.is_self_or_admin(doctor_id) {
        return Err(AppError::Forbidden(
            "Doctors can only view their own appointments".to_string(),
        ));
    }

    let appointments = state.service().by_doctor_on(doctor_id, date).await?;

    Ok(Json(json!({ "success": true, "data": appointments })))
}

pub async fn patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !(user.is_staff() || user.id == patient_id) {
        return Err(AppError::Forbidden(
            "Patients can only view their own appointments".to_string(),
        ));
    }

    let appointments = state.service().by_patient(patient_id).await?;

    Ok(Json(json!({ "success": true, "data": appointments })))
}

pub async fn appointments_by_status(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(status): Path<AppointmentStatus>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let appointments = state.service().by_status(status).await?;

    Ok(Json(json!({ "success": true, "data": appointments })))
}
