use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_config::AppConfig;

use crate::error::BillingError;
use crate::models::MomoCallback;

type HmacSha256 = Hmac<Sha256>;

/// Millisecond timestamps MoMo order ids end with.
const ORDER_TIMESTAMP_DIGITS: usize = 13;

/// HMAC-SHA256 signing and verification of MoMo callbacks.
#[derive(Clone)]
pub struct MomoSigner {
    access_key: String,
    secret_key: String,
}

impl MomoSigner {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BillingError> {
        if !config.is_momo_configured() {
            return Err(BillingError::NotConfigured);
        }
        Ok(Self::new(&config.momo_access_key, &config.momo_secret_key))
    }

    /// Fields in the alphabetical order MoMo signs them.
    fn raw_signature(&self, callback: &MomoCallback) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}\
             &orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}\
             &resultCode={}&transId={}",
            self.access_key,
            callback.amount,
            callback.extra_data,
            callback.message,
            callback.order_id,
            callback.order_info,
            callback.order_type,
            callback.partner_code,
            callback.pay_type,
            callback.request_id,
            callback.response_time,
            callback.result_code,
            callback.trans_id,
        )
    }

    fn mac(&self, callback: &MomoCallback) -> Result<HmacSha256, BillingError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| BillingError::NotConfigured)?;
        mac.update(self.raw_signature(callback).as_bytes());
        Ok(mac)
    }

    /// Lowercase hex signature, as MoMo sends it.
    pub fn sign(&self, callback: &MomoCallback) -> Result<String, BillingError> {
        Ok(format!("{:x}", self.mac(callback)?.finalize().into_bytes()))
    }

    /// Constant-time check of `callback.signature`. A missing signature is rejected.
    pub fn verify(&self, callback: &MomoCallback) -> Result<(), BillingError> {
        let signature = decode_hex(callback.signature.trim()).ok_or_else(|| {
            debug!("MoMo signature for order {} is not hex", callback.order_id);
            BillingError::InvalidSignature
        })?;

        self.mac(callback)?.verify_slice(&signature).map_err(|_| {
            debug!("MoMo signature mismatch for order {}", callback.order_id);
            BillingError::InvalidSignature
        })
    }
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.is_empty() || raw.len() % 2 != 0 || !raw.is_ascii() {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// Invoice id embedded in an order id of the form `{partner}-{invoice}-{millis}`.
/// Falls back to the digits before the trailing millisecond timestamp.
pub fn invoice_id_from_order(order_id: &str) -> Option<i64> {
    if let Some(id) = order_id
        .split('-')
        .nth(1)
        .and_then(|part| part.parse::<i64>().ok())
        .filter(|id| *id > 0)
    {
        return Some(id);
    }

    let digits: String = order_id.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > ORDER_TIMESTAMP_DIGITS {
        digits[..digits.len() - ORDER_TIMESTAMP_DIGITS]
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn signer() -> MomoSigner {
        MomoSigner::new("F8BBA842ECF85", "K951B6PE1waDMi640xX08PD3vg6EkVlz")
    }

    fn callback() -> MomoCallback {
        MomoCallback {
            partner_code: "MOMO".to_string(),
            order_id: "MOMO-42-1717200000000".to_string(),
            request_id: "MOMO-42-1717200000000".to_string(),
            amount: 350_000,
            order_info: "Thanh toan hoa don".to_string(),
            order_type: "momo_wallet".to_string(),
            trans_id: 4_088_878_653,
            result_code: 0,
            message: "Successful.".to_string(),
            pay_type: "qr".to_string(),
            response_time: 1_717_200_012_345,
            extra_data: String::new(),
            signature: String::new(),
        }
    }

    fn signed() -> MomoCallback {
        let mut cb = callback();
        cb.signature = signer().sign(&cb).unwrap();
        cb
    }

    #[test]
    fn raw_signature_lists_fields_alphabetically() {
        assert_eq!(
            signer().raw_signature(&callback()),
            "accessKey=F8BBA842ECF85&amount=350000&extraData=&message=Successful.\
             &orderId=MOMO-42-1717200000000&orderInfo=Thanh toan hoa don\
             &orderType=momo_wallet&partnerCode=MOMO&payType=qr\
             &requestId=MOMO-42-1717200000000&responseTime=1717200012345\
             &resultCode=0&transId=4088878653"
        );
    }

    #[test]
    fn signature_is_lowercase_sha256_hex() {
        let signature = signer().sign(&callback()).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn own_signature_verifies() {
        assert!(signer().verify(&signed()).is_ok());
    }

    #[test]
    fn uppercase_hex_verifies() {
        let mut cb = signed();
        cb.signature = cb.signature.to_uppercase();
        assert!(signer().verify(&cb).is_ok());
    }

    #[test]
    fn tampered_amount_is_rejected() {
        let mut cb = signed();
        cb.amount = 1_000;
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
    }

    #[test]
    fn tampered_result_code_is_rejected() {
        let mut cb = signed();
        cb.result_code = 1006;
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut cb = signed();
        let last = if cb.signature.ends_with('0') { "1" } else { "0" };
        cb.signature.replace_range(63.., last);
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
    }

    #[test]
    fn missing_or_malformed_signature_is_rejected() {
        let mut cb = callback();
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
        cb.signature = "not-hex".to_string();
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
        cb.signature = "abc".to_string();
        assert_matches!(signer().verify(&cb), Err(BillingError::InvalidSignature));
    }

    #[test]
    fn other_secret_is_rejected() {
        let other = MomoSigner::new("F8BBA842ECF85", "another-secret");
        assert_matches!(other.verify(&signed()), Err(BillingError::InvalidSignature));
    }

    #[test]
    fn invoice_id_from_order_ids() {
        assert_eq!(invoice_id_from_order("MOMO-42-1717200000000"), Some(42));
        assert_eq!(invoice_id_from_order("MOMO421717200000000"), Some(42));
        assert_eq!(invoice_id_from_order("MOMO-abc-1717200000000"), None);
        assert_eq!(invoice_id_from_order(""), None);
    }
}
