use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use billing_cell::{billing_routes, BillingState};
use schedule_cell::{schedule_routes, ScheduleState};

pub fn create_router(
    schedules: Arc<ScheduleState>,
    appointments: Arc<AppointmentState>,
    billing: Arc<BillingState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/appointments", appointment_routes(appointments))
        .nest("/schedules", schedule_routes(schedules))
        .merge(billing_routes(billing))
}
