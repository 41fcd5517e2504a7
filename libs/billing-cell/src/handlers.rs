use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_staff;

use crate::error::BillingError;
use crate::models::{InvoiceTotalRequest, MomoCallback, PaymentOutcome};
use crate::router::BillingState;
use crate::services::invoice::invoice_total;
use crate::services::momo::{invoice_id_from_order, MomoSigner};

fn verified_outcome(
    state: &BillingState,
    callback: &MomoCallback,
) -> Result<PaymentOutcome, BillingError> {
    let signer = MomoSigner::from_config(&state.config)?;
    if let Err(e) = signer.verify(callback) {
        warn!("Rejected MoMo callback for order {}", callback.order_id);
        return Err(e);
    }

    Ok(PaymentOutcome {
        invoice_id: invoice_id_from_order(&callback.order_id),
        order_id: callback.order_id.clone(),
        trans_id: callback.trans_id,
        paid: callback.is_success(),
        result_code: callback.result_code,
    })
}

pub async fn invoice_total_quote(
    Extension(user): Extension<User>,
    Json(request): Json<InvoiceTotalRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let total = invoice_total(&request.packages, &request.medicines)?;

    Ok(Json(json!({
        "success": true,
        "data": total
    })))
}

/// Server-to-server notification. A failed payment is acknowledged, not rejected.
pub async fn momo_ipn(
    State(state): State<Arc<BillingState>>,
    Json(callback): Json<MomoCallback>,
) -> Result<Json<Value>, AppError> {
    let outcome = verified_outcome(&state, &callback)?;

    let message = if outcome.paid {
        info!(
            "MoMo confirmed payment {} for invoice {:?}",
            outcome.trans_id, outcome.invoice_id
        );
        "Confirm Success"
    } else {
        info!(
            "MoMo reported result {} for order {}",
            outcome.result_code, outcome.order_id
        );
        "Confirm Fail"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": outcome
    })))
}

/// Browser redirect after checkout.
pub async fn momo_return(
    State(state): State<Arc<BillingState>>,
    Query(callback): Query<MomoCallback>,
) -> Result<Json<Value>, AppError> {
    let outcome = verified_outcome(&state, &callback)?;

    if !outcome.paid {
        return Err(BillingError::PaymentFailed {
            result_code: outcome.result_code,
        }
        .into());
    }

    info!(
        "MoMo payment {} returned for invoice {:?}",
        outcome.trans_id, outcome.invoice_id
    );

    Ok(Json(json!({
        "success": true,
        "message": "MoMo payment succeeded",
        "data": outcome
    })))
}
