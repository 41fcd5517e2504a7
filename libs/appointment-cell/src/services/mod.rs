pub mod availability;
pub mod booking;
pub mod expiry;
pub mod lifecycle;
