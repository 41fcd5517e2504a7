use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use crate::services::schedule::ScheduleService;

/// Runs the shift status sweep every `every` until `shutdown` flips to true
/// or its sender is dropped.
#[instrument(skip(service, shutdown))]
pub async fn run_status_sweep_loop(
    service: Arc<ScheduleService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Schedule status sweep started, running every {:?}", every);

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.auto_update_statuses().await {
                    Ok(summary) if summary.marked_absent + summary.marked_completed > 0 => {
                        info!(
                            "Sweep updated shifts: {} absent, {} completed",
                            summary.marked_absent, summary.marked_completed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("Schedule status sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Schedule status sweep stopped");
}
