pub mod models;
pub mod services;
pub mod templates;

pub use models::*;
pub use services::dispatcher::{NotificationPublisher, NotificationWorker};
pub use services::email::{build_email_sender, EmailSender, HttpEmailClient, LogEmailSender};
