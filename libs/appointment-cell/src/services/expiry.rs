use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use notification_cell::NotificationKind;

use crate::error::AppointmentError;
use crate::models::{
    AppointmentChanges, AppointmentQuery, AppointmentStatus, AutoCancelSummary,
    CancelledAppointment, ExpiryFailure, AUTO_CANCEL_REASON,
};
use crate::services::booking::AppointmentService;

impl AppointmentService {
    /// Cancels today's pending and confirmed appointments whose slot started
    /// more than the grace period ago. Each row is cancelled only while it is
    /// still pending or confirmed; one failing row does not stop the sweep.
    #[instrument(skip(self))]
    pub async fn auto_cancel_overdue(&self) -> Result<AutoCancelSummary, AppointmentError> {
        let today = self.clock.today();
        let now = self.clock.local_now();

        let candidates = self
            .appointments
            .list(&AppointmentQuery {
                date: Some(today),
                statuses: AppointmentStatus::EXPIRABLE.to_vec(),
                ..Default::default()
            })
            .await?;

        let mut summary = AutoCancelSummary::default();

        for appointment in candidates.into_iter().filter(|a| now > a.expires_at()) {
            let changes = AppointmentChanges {
                status: Some(AppointmentStatus::Cancelled),
                cancel_reason: Some(AUTO_CANCEL_REASON.to_string()),
                cancel_confirmed_at: Some(self.clock.now()),
                ..Default::default()
            };

            match self
                .appointments
                .update(appointment.id, &AppointmentStatus::EXPIRABLE, &changes)
                .await
            {
                Ok(Some(cancelled)) => {
                    self.notify(
                        NotificationKind::Cancelled {
                            reason: AUTO_CANCEL_REASON.to_string(),
                        },
                        &cancelled,
                    );
                    summary.cancelled.push(CancelledAppointment {
                        id: cancelled.id,
                        patient_name: cancelled.patient_name,
                        appointment_date: cancelled.appointment_date,
                        time_slot: cancelled.time_slot,
                    });
                }
                Ok(None) => {
                    debug!("Appointment {} left the expirable states, skipped", appointment.id);
                }
                Err(e) => {
                    warn!("Failed to auto-cancel appointment {}: {}", appointment.id, e);
                    summary.failed.push(ExpiryFailure {
                        id: appointment.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        summary.cancelled_count = summary.cancelled.len();
        if summary.cancelled_count > 0 || !summary.failed.is_empty() {
            info!(
                "Auto-cancel sweep: {} cancelled, {} failed",
                summary.cancelled_count,
                summary.failed.len()
            );
        }
        Ok(summary)
    }
}

/// Runs the auto-cancel sweep every `every` until `shutdown` flips to true
/// or its sender is dropped.
#[instrument(skip(service, shutdown))]
pub async fn run_expiry_loop(
    service: Arc<AppointmentService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Appointment expiry sweep started, running every {:?}", every);

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = service.auto_cancel_overdue().await {
                    error!("Appointment expiry sweep failed: {}", e);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Appointment expiry sweep stopped");
}
