pub mod conflict;
pub mod schedule;
pub mod sweeper;
