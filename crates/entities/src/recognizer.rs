use async_trait::async_trait;
use chrono::{DateTime, Utc};
use companyinfo_core::{InboundEvent, RecognizedEntity, ServiceError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "entity-recognition";

/// A chat message submitted for company recognition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub text: String,
    pub space_id: Option<String>,
    pub message_id: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

impl RecognitionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            space_id: None,
            message_id: None,
            posted_at: None,
            author_id: None,
            author_name: None,
        }
    }

    /// `None` when the event carries no message text.
    pub fn from_event(event: &InboundEvent) -> Option<Self> {
        Some(Self {
            text: event.text()?.to_string(),
            space_id: event.space_id.clone(),
            message_id: event.message_id.clone(),
            posted_at: event.posted_at(),
            author_id: event.user_id.clone(),
            author_name: event.user_name.clone(),
        })
    }

    fn to_wire(&self) -> WirePost<'_> {
        let posted_at = self.posted_at.unwrap_or_else(Utc::now);
        WirePost {
            posted_by: WireAuthor {
                id: self.author_id.as_deref(),
                name: self.author_name.as_deref(),
            },
            time_stamp: posted_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            thread_id: self.space_id.as_deref(),
            post_id: self.message_id.as_deref(),
            post_text: &self.text,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePost<'a> {
    posted_by: WireAuthor<'a>,
    time_stamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<&'a str>,
    post_text: &'a str,
}

#[derive(Debug, Serialize)]
struct WireAuthor<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    result: Option<RecognitionResult>,
}

#[derive(Debug, Default, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    entity: Option<Vec<WireEntity>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntity {
    #[serde(default)]
    search_token: Option<String>,
    #[serde(default)]
    relevance_score: Option<f64>,
}

#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<Vec<RecognizedEntity>, ServiceError>;
}

pub struct HttpEntityRecognizer {
    client: Client,
    url: String,
}

impl HttpEntityRecognizer {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl EntityRecognizer for HttpEntityRecognizer {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<Vec<RecognizedEntity>, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&request.to_wire())
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: SERVICE,
                message: error.to_string(),
            })?;

        let status = response.status();
        debug!(
            event_name = "entities.recognition.response",
            status = status.as_u16(),
            "entity recognition responded"
        );
        if status != StatusCode::OK {
            return Err(ServiceError::Status { service: SERVICE, status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(|error| ServiceError::Transport {
            service: SERVICE,
            message: error.to_string(),
        })?;
        let body: RecognitionResponse = serde_json::from_slice(&bytes).map_err(|error| {
            ServiceError::Decode { service: SERVICE, message: error.to_string() }
        })?;

        Ok(entities_from(body))
    }
}

fn entities_from(body: RecognitionResponse) -> Vec<RecognizedEntity> {
    body.result
        .and_then(|result| result.entity)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entity| {
            let id = entity.search_token?;
            Some(RecognizedEntity::new(id, entity.relevance_score.unwrap_or(0.0)))
        })
        .collect()
}
