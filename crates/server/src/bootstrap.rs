use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use companyinfo_core::config::{AppConfig, ConfigError};
use companyinfo_core::ServiceError;
use companyinfo_entities::{HttpEntityRecognizer, HttpMetadataSource};
use companyinfo_watson::{TokenProvider, WatsonMessageSender};
use thiserror::Error;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub tokens: Arc<TokenProvider>,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("app authentication failed: {0}")]
    TokenAcquisition(#[source] ServiceError),
}

impl Application {
    pub fn router(&self) -> Router {
        webhook::router(webhook::WebhookState::new(
            self.config.app.webhook_secret.clone(),
            Arc::clone(&self.dispatcher),
        ))
        .merge(health::router(Arc::clone(&self.tokens)))
    }
}

/// Builds every outbound client and authenticates the app. The webhook must
/// not be served unless this succeeds.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        app_id = %config.app.id,
        "starting application bootstrap"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let tokens = Arc::new(TokenProvider::new(
        client.clone(),
        &config.watson.api_base_url,
        config.app.id.clone(),
        config.app.secret.clone(),
    ));
    tokens.acquire().await.map_err(BootstrapError::TokenAcquisition)?;
    info!(
        event_name = "system.bootstrap.authenticated",
        correlation_id = "bootstrap",
        "app authenticated with the platform"
    );

    let recognizer =
        Arc::new(HttpEntityRecognizer::new(client.clone(), config.entities.recognition_url.clone()));
    let metadata = Arc::new(HttpMetadataSource::new(
        client.clone(),
        config.entities.metadata_url.clone(),
        config.entities.user_id.clone(),
        config.entities.key.clone(),
    ));
    let sender = Arc::new(WatsonMessageSender::new(
        client,
        config.watson.api_base_url.clone(),
        Arc::clone(&tokens),
    ));
    let dispatcher =
        Arc::new(Dispatcher::new(config.app.id.clone(), recognizer, metadata, sender));

    Ok(Application { config, tokens, dispatcher })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Body,
        extract::{Path, State},
        http::{Request, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use companyinfo_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use companyinfo_core::sign;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{bootstrap_with_config, Application, BootstrapError};

    #[derive(Clone, Default)]
    struct Upstream {
        posted: Arc<Mutex<Vec<(String, Value)>>>,
    }

    async fn token() -> Json<Value> {
        Json(json!({ "access_token": "upstream-token" }))
    }

    async fn recognize() -> Json<Value> {
        Json(json!({
            "result": { "entity": [
                { "searchToken": "C:AcmeCompany", "relevanceScore": 100 },
                { "searchToken": "C:Missing", "relevanceScore": 90 },
                { "searchToken": "C:Faint", "relevanceScore": 10 }
            ] }
        }))
    }

    async fn metadata(Path(entity_id): Path<String>) -> (StatusCode, Json<Value>) {
        if entity_id != "C:AcmeCompany" {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "result": {
                    "name": "The Acme company",
                    "data": { "entityMap": {
                        "language": [],
                        "industry": [{ "name": "Test industry" }],
                        "sector": [{ "name": "Test sector" }],
                        "segment": [{ "name": "Test segment" }]
                    } }
                }
            })),
        )
    }

    async fn post_message(
        State(upstream): State<Upstream>,
        Path(space_id): Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        upstream.posted.lock().expect("posted lock").push((space_id, body));
        StatusCode::CREATED
    }

    async fn serve_upstream(upstream: Upstream) -> String {
        let router = Router::new()
            .route("/oauth/token", post(token))
            .route("/entity/recognition", post(recognize))
            .route("/entity/{entity_id}/metadata", get(metadata))
            .route("/v1/spaces/{space_id}/messages", post(post_message))
            .with_state(upstream);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("upstream stub server");
        });
        format!("http://{address}")
    }

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn options(base_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                app_id: Some("testappid".to_string()),
                app_secret: Some("testsecret".to_string()),
                webhook_secret: Some("testwsecret".to_string()),
                api_base_url: Some(base_url.to_string()),
                entities_user_id: Some("testfruserid".to_string()),
                entities_key: Some("testfrkey".to_string()),
                recognition_url: Some(format!("{base_url}/entity/recognition")),
                metadata_url: Some(format!("{base_url}/entity/%s/metadata")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_credentials() {
        let result = bootstrap(LoadOptions::default()).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_fails_when_app_cannot_authenticate() {
        let result = bootstrap(options("http://127.0.0.1:9")).await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::TokenAcquisition(_)));
        assert!(error.to_string().contains("app authentication failed"));
    }

    #[tokio::test]
    async fn end_to_end_message_yields_one_company_post() {
        let upstream = Upstream::default();
        let base_url = serve_upstream(upstream.clone()).await;
        let app = bootstrap(options(&base_url)).await.expect("bootstrap");
        assert!(app.tokens.status().await.acquired);
        let config: &AppConfig = &app.config;
        assert_eq!(config.app.id, "testappid");

        let body = r#"{"type":"message-created","content":"I'm meeting with folks at Acme tomorrow","userName":"Jane","spaceId":"testspace"}"#;
        let signature = sign(b"testwsecret", body.as_bytes()).expect("sign");
        let request = Request::post("/companyinfo")
            .header("x-outbound-token", signature)
            .body(Body::from(body))
            .expect("request");

        let response = app.router().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        for _ in 0..300 {
            if !upstream.posted.lock().expect("posted lock").is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let posted = upstream.posted.lock().expect("posted lock").clone();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "testspace");
        assert_eq!(
            posted[0].1["annotations"][0]["text"],
            "*Company*\nThe Acme company\n*Industries*\nTest industry\n*Sectors*\nTest sector\n*Segments*\nTest segment\n"
        );

        let health = app
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);
    }
}
