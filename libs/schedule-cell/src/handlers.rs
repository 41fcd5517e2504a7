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
use shared_utils::extractor::require_admin;

use crate::models::{BulkCreateRequest, BulkDeleteRequest, ScheduleFilter, ScheduleRequest};
use crate::router::ScheduleState;

// ==============================================================================
// READS
// ==============================================================================

pub async fn list_schedules(
    State(state): State<Arc<ScheduleState>>,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.service().list(&filter).await?;

    Ok(Json(json!({
        "success": true,
        "data": schedules,
        "total": schedules.len()
    })))
}

pub async fn get_schedule(
    State(state): State<Arc<ScheduleState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.service().get(schedule_id).await?;

    Ok(Json(json!({ "success": true, "data": schedule })))
}

pub async fn doctor_schedules(
    State(state): State<Arc<ScheduleState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.service().upcoming_for_doctor(doctor_id).await?;

    Ok(Json(json!({ "success": true, "data": schedules })))
}

pub async fn schedules_on_date(
    State(state): State<Arc<ScheduleState>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.service().on_date(date).await?;

    Ok(Json(json!({ "success": true, "data": schedules })))
}

pub async fn schedule_stats(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let stats = state.service().stats(&filter).await?;

    Ok(Json(json!({ "success": true, "data": stats })))
}

// ==============================================================================
// ADMIN WRITES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_admin(&user)?;

    let schedule = state.service().create(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Schedule created",
            "data": schedule
        })),
    ))
}

/// 201 when every row was created, 207 when only some were.
pub async fn bulk_create_schedules(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_admin(&user)?;

    let total = request.schedules.len();
    let outcome = state.service().bulk_create(request.schedules).await?;

    let status = if outcome.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": format!("Created {}/{} schedules", outcome.created.len(), total),
            "data": outcome.created,
            "errors": outcome.errors
        })),
    ))
}

pub async fn update_schedule(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let schedule = state.service().update(schedule_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule updated",
        "data": schedule
    })))
}

pub async fn delete_schedule(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    state.service().delete(schedule_id).await?;

    Ok(Json(json!({ "success": true, "message": "Schedule deleted" })))
}

pub async fn bulk_delete_schedules(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let deleted = state.service().bulk_delete(request.schedule_ids).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {} schedules", deleted),
        "deleted": deleted
    })))
}

pub async fn auto_update_statuses(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let summary = state.service().auto_update_statuses().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule statuses updated",
        "data": summary
    })))
}

// ==============================================================================
// ATTENDANCE
// ==============================================================================

pub async fn check_in(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.service().check_in(schedule_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Checked in",
        "data": schedule
    })))
}

pub async fn check_out(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.service().check_out(schedule_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Checked out",
        "data": schedule
    })))
}
