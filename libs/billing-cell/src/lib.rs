pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::BillingError;
pub use models::*;
pub use router::{billing_routes, BillingState};
pub use services::invoice::invoice_total;
pub use services::momo::{invoice_id_from_order, MomoSigner};
