use async_trait::async_trait;
use companyinfo_core::{CompanyMetadata, NamedItem, ServiceError};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

const SERVICE: &str = "entity-metadata";

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// `Ok(None)` when the service knows nothing about the entity.
    async fn metadata(&self, entity_id: &str) -> Result<Option<CompanyMetadata>, ServiceError>;
}

/// Looks entities up through a URL template holding a `%s` or `{id}` placeholder.
pub struct HttpMetadataSource {
    client: Client,
    url_template: String,
    user_id: String,
    key: SecretString,
}

impl HttpMetadataSource {
    pub fn new(
        client: Client,
        url_template: impl Into<String>,
        user_id: impl Into<String>,
        key: SecretString,
    ) -> Self {
        Self { client, url_template: url_template.into(), user_id: user_id.into(), key }
    }

    fn url_for(&self, entity_id: &str) -> String {
        let entity_id = urlencoding::encode(entity_id);
        if self.url_template.contains("{id}") {
            self.url_template.replacen("{id}", &entity_id, 1)
        } else {
            self.url_template.replacen("%s", &entity_id, 1)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    result: Option<MetadataResult>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<MetadataData>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataData {
    #[serde(default, rename = "entityMap")]
    entity_map: Option<EntityMap>,
}

#[derive(Debug, Default, Deserialize)]
struct EntityMap {
    #[serde(default)]
    industry: Option<Vec<NamedItem>>,
    #[serde(default)]
    sector: Option<Vec<NamedItem>>,
    #[serde(default)]
    segment: Option<Vec<NamedItem>>,
    #[serde(default)]
    language: Option<Vec<NamedItem>>,
}

impl From<MetadataResult> for CompanyMetadata {
    fn from(result: MetadataResult) -> Self {
        let map = result.data.and_then(|data| data.entity_map).unwrap_or_default();
        Self {
            name: result.name.unwrap_or_default(),
            languages: map.language.unwrap_or_default(),
            industries: map.industry.unwrap_or_default(),
            sectors: map.sector.unwrap_or_default(),
            segments: map.segment.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn metadata(&self, entity_id: &str) -> Result<Option<CompanyMetadata>, ServiceError> {
        let response = self
            .client
            .get(self.url_for(entity_id))
            .header("frUserId", &self.user_id)
            .header("authKey", self.key.expose_secret())
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: SERVICE,
                message: error.to_string(),
            })?;

        let status = response.status();
        debug!(
            event_name = "entities.metadata.response",
            entity_id,
            status = status.as_u16(),
            "entity metadata responded"
        );
        if status != StatusCode::OK {
            return Err(ServiceError::Status { service: SERVICE, status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(|error| ServiceError::Transport {
            service: SERVICE,
            message: error.to_string(),
        })?;
        let body: MetadataResponse = serde_json::from_slice(&bytes).map_err(|error| {
            ServiceError::Decode { service: SERVICE, message: error.to_string() }
        })?;

        Ok(body.result.map(CompanyMetadata::from))
    }
}
