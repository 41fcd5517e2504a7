use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    run_expiry_loop, AppointmentRepository, AppointmentState, InMemoryAppointmentRepository,
    SupabaseAppointmentRepository,
};
use billing_cell::BillingState;
use notification_cell::{build_email_sender, NotificationPublisher, NotificationWorker};
use schedule_cell::{
    run_status_sweep_loop, InMemoryScheduleRepository, ScheduleRepository, ScheduleState,
    SupabaseScheduleRepository,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

fn storage(config: &AppConfig) -> (Arc<dyn ScheduleRepository>, Arc<dyn AppointmentRepository>) {
    if config.is_storage_configured() {
        let supabase = Arc::new(SupabaseClient::new(config));
        info!("Using Supabase storage at {}", supabase.get_base_url());
        (
            Arc::new(SupabaseScheduleRepository::new(supabase.clone())),
            Arc::new(SupabaseAppointmentRepository::new(supabase)),
        )
    } else {
        warn!("Storage not configured, data lives in memory and is lost on restart");
        (
            Arc::new(InMemoryScheduleRepository::new()),
            Arc::new(InMemoryAppointmentRepository::new()),
        )
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.max(1) * 60)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic API server");

    let config = Arc::new(AppConfig::from_env());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.clinic_offset()));
    let (schedules, appointments) = storage(&config);

    // Notifications are delivered off the request path
    let (notifier, events) = NotificationPublisher::channel();
    let worker = NotificationWorker::new(events, build_email_sender(&config), config.email_from.clone());
    let worker_handle = tokio::spawn(worker.run());

    let schedule_state = Arc::new(ScheduleState {
        config: config.clone(),
        schedules: schedules.clone(),
        clock: clock.clone(),
    });
    let appointment_state = Arc::new(AppointmentState {
        config: config.clone(),
        appointments,
        schedules,
        notifier,
        clock,
    });

    // Background sweeps
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeps = vec![
        tokio::spawn(run_expiry_loop(
            Arc::new(appointment_state.service()),
            minutes(config.auto_cancel_interval_minutes),
            shutdown_rx.clone(),
        )),
        tokio::spawn(run_status_sweep_loop(
            Arc::new(schedule_state.service()),
            minutes(config.schedule_sweep_interval_minutes),
            shutdown_rx,
        )),
    ];

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    if !config.is_momo_configured() {
        warn!("MoMo credentials not configured, payment callbacks will be refused");
    }
    let billing_state = Arc::new(BillingState {
        config: config.clone(),
    });

    let app = router::create_router(schedule_state, appointment_state.clone(), billing_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    for sweep in sweeps {
        if let Err(e) = sweep.await {
            error!("Sweep task ended abnormally: {}", e);
        }
    }

    // Dropping the last publisher lets the worker drain and exit
    drop(appointment_state);
    if let Err(e) = worker_handle.await {
        error!("Notification worker ended abnormally: {}", e);
    }

    info!("Server stopped");
    Ok(())
}
