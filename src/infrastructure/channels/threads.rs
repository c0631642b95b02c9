//! Meta Threads Graph API: create a media container, then publish it

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Channel, DeliveryResult, Message};
use crate::config::ThreadsCfg;
use crate::shared::errors::DeliveryError;

#[derive(Clone)]
pub enum ThreadsAuth {
    LongLivedToken(String),
    ClientCredentials { app_id: String, app_secret: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

pub struct ThreadsChannel {
    http_client: Client,
    api_base: String,
    token_url: String,
    account_id: String,
    auth: ThreadsAuth,
    access_token: OnceCell<String>,
}

impl ThreadsChannel {
    pub fn new(http_client: Client, cfg: &ThreadsCfg, account_id: String, auth: ThreadsAuth) -> Self {
        Self {
            http_client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token_url: cfg.token_url.clone(),
            account_id,
            auth,
            access_token: OnceCell::new(),
        }
    }

    /// Access token, exchanged once per run when only app credentials are configured
    async fn token(&self) -> Result<&str, DeliveryError> {
        let token = self
            .access_token
            .get_or_try_init(|| async {
                match &self.auth {
                    ThreadsAuth::LongLivedToken(token) => Ok::<_, DeliveryError>(token.clone()),
                    ThreadsAuth::ClientCredentials { app_id, app_secret } => {
                        debug!("Requesting Threads access token");
                        let response = self
                            .http_client
                            .get(&self.token_url)
                            .query(&[
                                ("client_id", app_id.as_str()),
                                ("client_secret", app_secret.as_str()),
                                ("grant_type", "client_credentials"),
                            ])
                            .send()
                            .await?;
                        let body: TokenResponse = check(response).await?.json().await?;
                        Ok(body.access_token)
                    }
                }
            })
            .await?;
        Ok(token.as_str())
    }

    async fn create_container(&self, token: &str, message: &Message) -> Result<String, DeliveryError> {
        let mut form = vec![("access_token", token), ("text", message.text.as_str())];
        match &message.image_url {
            Some(url) => {
                form.push(("media_type", "IMAGE"));
                form.push(("image_url", url.as_str()));
            }
            None => form.push(("media_type", "TEXT")),
        }

        let response = self
            .http_client
            .post(format!("{}/{}/threads", self.api_base, self.account_id))
            .form(&form)
            .send()
            .await?;
        let body: IdResponse = check(response).await?.json().await?;
        Ok(body.id)
    }

    async fn publish(&self, token: &str, container_id: &str) -> Result<String, DeliveryError> {
        let response = self
            .http_client
            .post(format!("{}/{}/threads_publish", self.api_base, self.account_id))
            .form(&[("access_token", token), ("creation_id", container_id)])
            .send()
            .await?;
        let body: IdResponse = check(response).await?.json().await?;
        Ok(body.id)
    }

    async fn try_post(&self, message: &Message) -> Result<(), DeliveryError> {
        let token = self.token().await?;
        let container_id = self.create_container(token, message).await?;
        debug!(container_id = %container_id, "Threads container created");
        let post_id = self.publish(token, &container_id).await?;
        info!(post_id = %post_id, "Published to Threads");
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeliveryError::AuthRejected(format!("HTTP {}: {}", status, body))
        }
        _ => DeliveryError::ApiError(format!("HTTP {}: {}", status, body)),
    })
}

#[async_trait]
impl Channel for ThreadsChannel {
    fn name(&self) -> &str {
        "threads"
    }

    async fn post(&self, message: &Message) -> DeliveryResult {
        self.try_post(message).await.into()
    }
}
