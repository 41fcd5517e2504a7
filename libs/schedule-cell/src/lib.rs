pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use error::ScheduleError;
pub use models::*;
pub use repository::{InMemoryScheduleRepository, ScheduleRepository, SupabaseScheduleRepository};
pub use router::{schedule_routes, ScheduleState};
pub use services::conflict::{ranges_overlap, ConflictChecker};
pub use services::schedule::ScheduleService;
pub use services::sweeper::run_status_sweep_loop;
