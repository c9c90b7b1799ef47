use std::time::Duration;

use companyinfo_core::config::{AppConfig, LoadOptions};
use companyinfo_core::{compose_company_message, RecognizedEntity, MIN_ENTITY_SCORE};
use companyinfo_entities::{
    EntityRecognizer, HttpEntityRecognizer, HttpMetadataSource, MetadataSource, RecognitionRequest,
};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_RUNTIME};

const COMMAND: &str = "lookup";

#[derive(Debug, Serialize)]
struct LookupReport {
    command: &'static str,
    status: &'static str,
    text: String,
    threshold: f64,
    entities: Vec<EntityReport>,
}

#[derive(Debug, Serialize)]
struct EntityReport {
    id: String,
    score: f64,
    relevant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Runs recognition and metadata lookup for `text` the same way the webhook
/// does, but prints the outcome instead of posting it. Metadata is fetched for
/// every entity so operators can see what the score threshold filters out.
pub fn run(text: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, error),
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(COMMAND, "http_client", error.to_string(), EXIT_RUNTIME)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(COMMAND, "runtime", error.to_string(), EXIT_RUNTIME)
        }
    };

    let recognizer = HttpEntityRecognizer::new(client.clone(), config.entities.recognition_url);
    let metadata = HttpMetadataSource::new(
        client,
        config.entities.metadata_url,
        config.entities.user_id,
        config.entities.key,
    );

    runtime.block_on(async {
        let entities = match recognizer.recognize(&RecognitionRequest::new(text)).await {
            Ok(entities) => entities,
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "recognition_failed",
                    error.to_string(),
                    EXIT_RUNTIME,
                )
            }
        };

        let mut reports = Vec::with_capacity(entities.len());
        for entity in entities {
            reports.push(describe(&metadata, entity).await);
        }

        let report = LookupReport {
            command: COMMAND,
            status: "ok",
            text: text.to_string(),
            threshold: MIN_ENTITY_SCORE,
            entities: reports,
        };
        match serde_json::to_string(&report) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => {
                CommandResult::failure(COMMAND, "serialization", error.to_string(), EXIT_RUNTIME)
            }
        }
    })
}

async fn describe(metadata: &dyn MetadataSource, entity: RecognizedEntity) -> EntityReport {
    let relevant = entity.is_relevant();
    let (message, error) = match metadata.metadata(&entity.id).await {
        Ok(Some(info)) => (Some(compose_company_message(&info)), None),
        Ok(None) => (None, None),
        Err(error) => (None, Some(error.to_string())),
    };
    EntityReport { id: entity.id, score: entity.score, relevant, message, error }
}
