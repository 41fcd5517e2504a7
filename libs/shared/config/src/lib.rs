use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub momo_partner_code: String,
    pub momo_access_key: String,
    pub momo_secret_key: String,
    pub clinic_utc_offset_minutes: i32,
    pub auto_cancel_interval_minutes: u64,
    pub schedule_sweep_interval_minutes: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, falling back to in-memory storage");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, every authenticated request will be rejected");
                    String::new()
                }),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_URL not set, notifications will only be logged");
                    String::new()
                }),
            email_api_key: env::var("EMAIL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_KEY not set, using empty value");
                    String::new()
                }),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_FROM not set, using default");
                    "no-reply@example.com".to_string()
                }),
            momo_partner_code: env::var("MOMO_PARTNER_CODE")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| "MOMO".to_string()),
            momo_access_key: env::var("MOMO_ACCESS_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| {
                    warn!("MOMO_ACCESS_KEY not set, MoMo callbacks will be rejected");
                    String::new()
                }),
            momo_secret_key: env::var("MOMO_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| {
                    warn!("MOMO_SECRET_KEY not set, MoMo callbacks will be rejected");
                    String::new()
                }),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", 420),
            auto_cancel_interval_minutes: parse_or("AUTO_CANCEL_INTERVAL_MINUTES", 15),
            schedule_sweep_interval_minutes: parse_or("SCHEDULE_SWEEP_INTERVAL_MINUTES", 15),
            port: parse_or("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.is_storage_configured() && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_storage_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_momo_configured(&self) -> bool {
        !self.momo_access_key.is_empty() && !self.momo_secret_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    /// Fixed offset of the clinic's wall clock. Out-of-range values fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                    self.clinic_utc_offset_minutes
                );
                Utc.fix()
            })
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
