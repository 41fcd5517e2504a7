use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::clock::Clock;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::repository::ScheduleRepository;
use crate::services::schedule::ScheduleService;

#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub clock: Arc<dyn Clock>,
}

impl ScheduleState {
    pub fn service(&self) -> ScheduleService {
        ScheduleService::new(self.schedules.clone(), self.clock.clone())
    }
}

pub fn schedule_routes(state: Arc<ScheduleState>) -> Router {
    // Every schedule route requires authentication; role checks live in the handlers
    let protected_routes = Router::new()
        .route("/", get(handlers::list_schedules).post(handlers::create_schedule))
        .route(
            "/bulk",
            post(handlers::bulk_create_schedules).delete(handlers::bulk_delete_schedules),
        )
        .route("/stats", get(handlers::schedule_stats))
        .route("/internal/auto-update-statuses", post(handlers::auto_update_statuses))
        .route("/doctor/{doctor_id}", get(handlers::doctor_schedules))
        .route("/date/{date}", get(handlers::schedules_on_date))
        .route(
            "/{schedule_id}",
            get(handlers::get_schedule)
                .put(handlers::update_schedule)
                .delete(handlers::delete_schedule),
        )
        .route("/{schedule_id}/check-in", post(handlers::check_in))
        .route("/{schedule_id}/check-out", post(handlers::check_out))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
