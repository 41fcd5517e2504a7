use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

#[derive(Clone)]
pub struct BillingState {
    pub config: Arc<AppConfig>,
}

pub fn billing_routes(state: Arc<BillingState>) -> Router {
    // MoMo calls these directly; the signature is the authentication
    let public_routes = Router::new()
        .route("/payments/momo/ipn", post(handlers::momo_ipn))
        .route("/payments/momo/return", get(handlers::momo_return));

    let protected_routes = Router::new()
        .route("/invoices/total", post(handlers::invoice_total_quote))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
