//! Incoming-webhook channel (Slack and Discord compatible payload)

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Channel, DeliveryResult, Message};
use crate::shared::errors::DeliveryError;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    /// Slack
    text: &'a str,
    /// Discord
    content: &'a str,
}

fn render(message: &Message) -> String {
    match &message.image_url {
        Some(url) => format!("{}\n{}", message.text, url),
        None => message.text.clone(),
    }
}

pub struct WebhookChannel {
    http_client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(http_client: Client, url: String) -> Self {
        Self { http_client, url }
    }

    async fn try_post(&self, message: &Message) -> Result<(), DeliveryError> {
        let text = render(message);
        let response = self
            .http_client
            .post(&self.url)
            .json(&WebhookPayload {
                text: &text,
                content: &text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::ApiError(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn post(&self, message: &Message) -> DeliveryResult {
        self.try_post(message).await.into()
    }
}
