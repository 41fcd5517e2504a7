use serde::{Deserialize, Serialize};

/// MoMo result code for a completed payment.
pub const MOMO_SUCCESS_CODE: i32 = 0;

// ==============================================================================
// INVOICE TOTALS
// ==============================================================================

/// One package or medicine line on an invoice. Prices are whole VND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub price: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceTotalRequest {
    #[serde(default)]
    pub packages: Vec<InvoiceLine>,
    #[serde(default)]
    pub medicines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotal {
    pub packages_amount: u64,
    pub medicines_amount: u64,
    pub total_amount: u64,
}

// ==============================================================================
// MOMO
// ==============================================================================

/// Payment result MoMo sends to the IPN endpoint (JSON body) and to the
/// return URL (query string).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomoCallback {
    #[serde(default)]
    pub partner_code: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub order_info: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub trans_id: i64,
    #[serde(default)]
    pub result_code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pay_type: String,
    #[serde(default)]
    pub response_time: i64,
    #[serde(default)]
    pub extra_data: String,
    #[serde(default)]
    pub signature: String,
}

impl MomoCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == MOMO_SUCCESS_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentOutcome {
    pub invoice_id: Option<i64>,
    pub order_id: String,
    pub trans_id: i64,
    pub paid: bool,
    pub result_code: i32,
}
