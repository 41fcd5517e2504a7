use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{EmailMessage, NotificationError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Transactional email API client: `POST {url}` with `{from, to, subject, html}`.
#[derive(Debug)]
pub struct HttpEmailClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        debug!("Sending email '{}' to {}", message.subject, message.to);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Email API rejected message: {} - {}", status, response_text);
            return Err(NotificationError::EmailApi {
                status: status.as_u16(),
                message: response_text,
            });
        }

        info!("Email '{}' delivered to {}", message.subject, message.to);
        Ok(())
    }
}

/// Fallback sender used when no email API is configured.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email delivery disabled, notification logged only"
        );
        Ok(())
    }
}

pub fn build_email_sender(config: &AppConfig) -> Arc<dyn EmailSender> {
    match HttpEmailClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("{}, falling back to log-only notifications", e);
            Arc::new(LogEmailSender)
        }
    }
}
