use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use companyinfo_watson::TokenProvider;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    tokens: Arc<TokenProvider>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub token: HealthCheck,
    pub checked_at: String,
}

pub fn router(tokens: Arc<TokenProvider>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { tokens })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let token = token_check(&state.tokens).await;
    let ready = token.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "companyinfo webhook listening".to_string(),
        },
        token,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn token_check(tokens: &TokenProvider) -> HealthCheck {
    let status = tokens.status().await;
    match (status.acquired, status.expired) {
        (true, false) => HealthCheck {
            status: "ready",
            detail: match status.expires_at {
                Some(expires_at) => format!("bearer token valid until {expires_at}"),
                None => "bearer token held for process lifetime".to_string(),
            },
        },
        (true, true) => {
            HealthCheck { status: "degraded", detail: "bearer token has expired".to_string() }
        }
        (false, _) => {
            HealthCheck { status: "degraded", detail: "no bearer token acquired".to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use companyinfo_watson::TokenProvider;
    use reqwest::Client;
    use serde_json::{json, Value};

    use crate::health::{health, HealthState};

    async fn oauth_stub() -> String {
        async fn token() -> Json<Value> {
            Json(json!({ "access_token": "stub-token" }))
        }

        let router = Router::new().route("/oauth/token", post(token));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("oauth stub server");
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn health_returns_ready_when_token_is_held() {
        let base_url = oauth_stub().await;
        let tokens = Arc::new(TokenProvider::new(
            Client::new(),
            &base_url,
            "testappid",
            "testsecret".to_string().into(),
        ));
        tokens.acquire().await.expect("token");

        let (status, Json(payload)) = health(State(HealthState { tokens })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.token.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_token() {
        let tokens = Arc::new(TokenProvider::new(
            Client::new(),
            "http://127.0.0.1:9",
            "testappid",
            "testsecret".to_string().into(),
        ));

        let (status, Json(payload)) = health(State(HealthState { tokens })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.token.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
