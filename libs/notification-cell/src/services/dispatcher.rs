use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, instrument, warn};

use crate::models::{EmailMessage, NotificationError, NotificationEvent};
use crate::services::email::EmailSender;
use crate::templates;

/// Producer half handed to the lifecycle services. Publishing never blocks
/// and never fails the caller.
#[derive(Clone)]
pub struct NotificationPublisher {
    tx: UnboundedSender<NotificationEvent>,
}

impl NotificationPublisher {
    pub fn channel() -> (Self, UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: NotificationEvent) {
        debug!(
            appointment_id = %event.appointment.appointment_id,
            "Publishing {:?} notification",
            event.kind
        );

        if let Err(e) = self.tx.send(event) {
            error!(
                appointment_id = %e.0.appointment.appointment_id,
                "Notification channel closed, event dropped"
            );
        }
    }
}

pub struct NotificationWorker {
    receiver: UnboundedReceiver<NotificationEvent>,
    sender: Arc<dyn EmailSender>,
    from: String,
}

impl NotificationWorker {
    pub fn new(
        receiver: UnboundedReceiver<NotificationEvent>,
        sender: Arc<dyn EmailSender>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            sender,
            from: from.into(),
        }
    }

    /// Drains events until every publisher is dropped.
    pub async fn run(mut self) {
        info!("Notification worker started");

        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.deliver(&event).await {
                error!(
                    appointment_id = %event.appointment.appointment_id,
                    "Failed to deliver notification: {}",
                    e
                );
            }
        }

        info!("Notification worker stopped");
    }

    #[instrument(skip(self, event), fields(appointment_id = %event.appointment.appointment_id))]
    pub async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let Some(to) = event.recipient() else {
            warn!("Patient has no email address, skipping notification");
            return Ok(());
        };

        let rendered = templates::render(event);
        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: rendered.subject,
            html: rendered.html,
        };

        self.sender.send(&message).await
    }
}
