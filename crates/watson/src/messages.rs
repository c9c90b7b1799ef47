use std::sync::Arc;

use async_trait::async_trait;
use companyinfo_core::{AppMessage, ServiceError};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::{endpoint, oauth::TokenProvider};

const SERVICE: &str = "space-messages";

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, space_id: &str, message: &AppMessage) -> Result<(), ServiceError>;
}

/// Posts app messages to `/v1/spaces/{space_id}/messages`.
pub struct WatsonMessageSender {
    client: Client,
    api_base_url: String,
    tokens: Arc<TokenProvider>,
}

impl WatsonMessageSender {
    pub fn new(client: Client, api_base_url: impl Into<String>, tokens: Arc<TokenProvider>) -> Self {
        Self { client, api_base_url: api_base_url.into(), tokens }
    }

    fn messages_url(&self, space_id: &str) -> String {
        let space_id = urlencoding::encode(space_id);
        endpoint(&self.api_base_url, &format!("/v1/spaces/{space_id}/messages"))
    }
}

#[async_trait]
impl MessageSender for WatsonMessageSender {
    async fn send(&self, space_id: &str, message: &AppMessage) -> Result<(), ServiceError> {
        let bearer = self.tokens.bearer().await?;
        let response = self
            .client
            .post(self.messages_url(space_id))
            .bearer_auth(bearer.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: SERVICE,
                message: error.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(ServiceError::Status { service: SERVICE, status: status.as_u16() });
        }

        debug!(
            event_name = "watson.messages.response",
            space_id,
            status = status.as_u16(),
            "message endpoint accepted app message"
        );
        info!(event_name = "watson.messages.sent", space_id, "sent message to space");
        Ok(())
    }
}
