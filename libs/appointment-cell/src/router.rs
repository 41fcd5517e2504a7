use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use notification_cell::NotificationPublisher;
use schedule_cell::ScheduleRepository;
use shared_config::AppConfig;
use shared_utils::clock::Clock;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::repository::AppointmentRepository;
use crate::services::booking::AppointmentService;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub notifier: NotificationPublisher,
    pub clock: Arc<dyn Clock>,
}

impl AppointmentState {
    pub fn service(&self) -> AppointmentService {
        AppointmentService::new(
            self.appointments.clone(),
            self.schedules.clone(),
            self.notifier.clone(),
            self.clock.clone(),
        )
    }
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    let public_routes = Router::new().route(
        "/available-time-slots/{doctor_id}/{date}",
        get(handlers::available_time_slots),
    );

    // Role and ownership checks live in the handlers
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/check-availability", get(handlers::check_availability))
        .route("/auto-cancel-overdue", post(handlers::auto_cancel_overdue))
        .route("/doctor/{doctor_id}", get(handlers::doctor_appointments))
        .route(
            "/doctor/{doctor_id}/date/{date}",
            get(handlers::doctor_appointments_on_date),
        )
        .route("/patient/{patient_id}", get(handlers::patient_appointments))
        .route("/status/{status}", get(handlers::appointments_by_status))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/start-treatment", post(handlers::start_treatment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel-request", post(handlers::request_cancellation))
        .route("/{appointment_id}/cancel-approve", post(handlers::approve_cancellation))
        .route("/{appointment_id}/cancel-reject", post(handlers::reject_cancellation))
        .route("/{appointment_id}/doctor-cancel", post(handlers::doctor_cancel))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
