pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use error::AppointmentError;
pub use models::*;
pub use repository::{
    AppointmentRepository, InMemoryAppointmentRepository, SupabaseAppointmentRepository,
};
pub use router::{appointment_routes, AppointmentState};
pub use services::availability::AvailabilityService;
pub use services::booking::AppointmentService;
pub use services::expiry::run_expiry_loop;
pub use services::lifecycle::Transition;
