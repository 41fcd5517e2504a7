use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("MoMo credentials are not configured")]
    NotConfigured,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invoice amount is too large")]
    AmountOverflow,

    #[error("MoMo payment failed")]
    PaymentFailed { result_code: i32 },
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotConfigured => AppError::Internal(err.to_string()),
            BillingError::InvalidSignature => AppError::BadRequest(err.to_string()),
            BillingError::AmountOverflow => AppError::ValidationError(err.to_string()),
            BillingError::PaymentFailed { result_code } => AppError::Detailed {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
                details: json!({ "code": result_code }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_http_statuses() {
        assert_eq!(
            AppError::from(BillingError::InvalidSignature).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(BillingError::PaymentFailed { result_code: 1006 }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(BillingError::NotConfigured).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
