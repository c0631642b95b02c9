//! Social channels behind a common posting interface

pub mod threads;
pub mod webhook;

pub use threads::{ThreadsAuth, ThreadsChannel};
pub use webhook::WebhookChannel;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Credentials, ThreadsCfg};
use crate::shared::errors::DeliveryError;

/// Channel-agnostic notification content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub image_url: Option<String>,
}

/// Outcome of one post on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered,
    Skipped,
    Failed(String),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

impl From<Result<(), DeliveryError>> for DeliveryResult {
    fn from(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryResult::Delivered,
            Err(e) => DeliveryResult::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryResult::Delivered => write!(f, "delivered"),
            DeliveryResult::Skipped => write!(f, "skipped"),
            DeliveryResult::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// A social-media destination
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn post(&self, message: &Message) -> DeliveryResult;
}

/// Build every channel whose credential bundle is complete
pub fn from_credentials(
    credentials: &Credentials,
    threads: &ThreadsCfg,
    timeout: Duration,
) -> Result<Vec<Arc<dyn Channel>>, DeliveryError> {
    let http_client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DeliveryError::NotConfigured(format!("failed to build HTTP client: {}", e)))?;

    let mut channels: Vec<Arc<dyn Channel>> = Vec::new();

    if let Some(account_id) = credentials.threads_account_id() {
        let auth = match (credentials.threads_long_lived_token(), credentials.threads_app()) {
            (Some(token), _) => Some(ThreadsAuth::LongLivedToken(token)),
            (None, Some((app_id, app_secret))) => Some(ThreadsAuth::ClientCredentials { app_id, app_secret }),
            (None, None) => None,
        };
        if let Some(auth) = auth {
            info!("Threads channel enabled");
            channels.push(Arc::new(ThreadsChannel::new(
                http_client.clone(),
                threads,
                account_id,
                auth,
            )));
        }
    }

    if let Some(url) = credentials.webhook_url() {
        info!("Webhook channel enabled");
        channels.push(Arc::new(WebhookChannel::new(http_client, url)));
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_require_complete_bundles() {
        let threads = ThreadsCfg::default();
        let timeout = Duration::from_secs(5);

        let none = from_credentials(&Credentials::default(), &threads, timeout).unwrap();
        assert!(none.is_empty());

        // account id without any token is incomplete
        let creds = Credentials {
            threads_account_id: Some("1789".to_string()),
            ..Credentials::default()
        };
        assert!(from_credentials(&creds, &threads, timeout).unwrap().is_empty());

        let creds = Credentials {
            threads_account_id: Some("1789".to_string()),
            threads_app_id: Some("app".to_string()),
            threads_app_secret: Some("secret".to_string()),
            webhook_url: Some("https://hooks.example.com/T000".to_string()),
            ..Credentials::default()
        };
        let channels = from_credentials(&creds, &threads, timeout).unwrap();
        let names: Vec<&str> = channels.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["threads", "webhook"]);
    }

    #[test]
    fn test_delivery_result_from_error() {
        let result: DeliveryResult = Err(DeliveryError::AuthRejected("expired token".into())).into();
        assert_eq!(
            result,
            DeliveryResult::Failed("Credentials rejected: expired token".to_string())
        );
        assert!(DeliveryResult::from(Ok(())).is_delivered());
    }
}
