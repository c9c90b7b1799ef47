use chrono::{DateTime, Duration, Utc};
use companyinfo_core::ServiceError;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::endpoint;

const SERVICE: &str = "oauth-token";
const MAX_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: SecretString,
    expires_at: Option<DateTime<Utc>>,
    refresh_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// The refresh margin is at most a minute and never more than half the
    /// lifetime, so a short-lived token is still reused for most of it.
    fn issue(access_token: SecretString, expires_in: Option<i64>, now: DateTime<Utc>) -> Self {
        let lifetime = expires_in.filter(|seconds| *seconds > 0);
        let margin = lifetime.map(|seconds| (seconds / 2).min(MAX_REFRESH_MARGIN_SECS));
        Self {
            access_token,
            expires_at: lifetime.map(|seconds| now + Duration::seconds(seconds)),
            refresh_at: lifetime
                .zip(margin)
                .map(|(seconds, margin)| now + Duration::seconds(seconds - margin)),
        }
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at.is_some_and(|refresh_at| refresh_at <= now)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub acquired: bool,
    pub expired: bool,
    pub expires_at: Option<String>,
}

/// Bearer token for outbound platform calls.
///
/// The token is acquired once before the webhook is served. When the grant
/// carried `expires_in`, the token is re-acquired on demand shortly before it
/// lapses; otherwise it is held for the life of the process.
#[derive(Debug)]
pub struct TokenProvider {
    client: Client,
    token_url: String,
    app_id: String,
    app_secret: SecretString,
    token: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        client: Client,
        api_base_url: &str,
        app_id: impl Into<String>,
        app_secret: SecretString,
    ) -> Self {
        Self {
            client,
            token_url: endpoint(api_base_url, "/oauth/token"),
            app_id: app_id.into(),
            app_secret,
            token: RwLock::new(None),
        }
    }

    /// Runs the client-credentials grant and stores the resulting token.
    pub async fn acquire(&self) -> Result<(), ServiceError> {
        let mut slot = self.token.write().await;
        *slot = Some(self.request_token().await?);
        Ok(())
    }

    /// Current bearer token, refreshed first when it is about to expire.
    pub async fn bearer(&self) -> Result<SecretString, ServiceError> {
        {
            let slot = self.token.read().await;
            if let Some(token) = slot.as_ref() {
                if !token.needs_refresh(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if !token.needs_refresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        match self.request_token().await {
            Ok(fresh) => {
                let access_token = fresh.access_token.clone();
                *slot = Some(fresh);
                Ok(access_token)
            }
            Err(error) => match slot.as_ref().filter(|token| !token.is_expired(Utc::now())) {
                Some(previous) => {
                    warn!(
                        event_name = "watson.oauth.refresh_failed",
                        error = %error,
                        "bearer token refresh failed; using previous token until it expires"
                    );
                    Ok(previous.access_token.clone())
                }
                None => {
                    warn!(
                        event_name = "watson.oauth.refresh_failed",
                        error = %error,
                        "bearer token refresh failed and no valid token is held"
                    );
                    Err(error)
                }
            },
        }
    }

    pub async fn status(&self) -> TokenStatus {
        let slot = self.token.read().await;
        match slot.as_ref() {
            Some(token) => TokenStatus {
                acquired: true,
                expired: token.is_expired(Utc::now()),
                expires_at: token.expires_at.map(|at| at.to_rfc3339()),
            },
            None => TokenStatus { acquired: false, expired: false, expires_at: None },
        }
    }

    async fn request_token(&self) -> Result<CachedToken, ServiceError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.app_id, Some(self.app_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: SERVICE,
                message: error.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(ServiceError::Status { service: SERVICE, status: response.status().as_u16() });
        }

        let body: TokenResponse = response.json().await.map_err(|error| ServiceError::Decode {
            service: SERVICE,
            message: error.to_string(),
        })?;
        if body.access_token.is_empty() {
            return Err(ServiceError::Decode {
                service: SERVICE,
                message: "token endpoint returned empty access token".to_string(),
            });
        }

        let token = CachedToken::issue(body.access_token.into(), body.expires_in, Utc::now());
        info!(
            event_name = "watson.oauth.token_acquired",
            app_id = %self.app_id,
            expires_at = token.expires_at.map(|at| at.to_rfc3339()).as_deref().unwrap_or("never"),
            "acquired app bearer token"
        );

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use reqwest::Client;
    use secrecy::ExposeSecret;
    use serde_json::{json, Value};

    use chrono::{Duration, TimeZone, Utc};

    use super::{CachedToken, TokenProvider};

    #[derive(Clone)]
    struct OAuthStub {
        calls: Arc<AtomicUsize>,
        expires_in: Option<i64>,
        status: StatusCode,
        fail_from_call: Option<usize>,
    }

    impl OAuthStub {
        fn new(calls: &Arc<AtomicUsize>, expires_in: Option<i64>, status: StatusCode) -> Self {
            Self { calls: Arc::clone(calls), expires_in, status, fail_from_call: None }
        }
    }

    async fn token(
        State(stub): State<OAuthStub>,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, Json<Value>) {
        let call = stub.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let authorized = headers.get("authorization").and_then(|value| value.to_str().ok())
            == Some("Basic dGVzdGFwcGlkOnRlc3RzZWNyZXQ=");
        if !authorized || body != "grant_type=client_credentials" {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad grant" })));
        }
        if stub.fail_from_call.is_some_and(|first_failure| call >= first_failure) {
            return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "unavailable" })));
        }

        let mut payload = json!({ "access_token": format!("token-{call}") });
        if let Some(expires_in) = stub.expires_in {
            payload["expires_in"] = json!(expires_in);
        }
        (stub.status, Json(payload))
    }

    async fn serve(stub: OAuthStub) -> String {
        let router = Router::new().route("/oauth/token", post(token)).with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("oauth stub server");
        });
        format!("http://{address}")
    }

    fn provider(base_url: &str) -> TokenProvider {
        TokenProvider::new(Client::new(), base_url, "testappid", "testsecret".to_string().into())
    }

    #[tokio::test]
    async fn acquires_token_with_client_credentials_grant() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url =
            serve(OAuthStub::new(&calls, None, StatusCode::OK)).await;
        let tokens = provider(&base_url);

        tokens.acquire().await.expect("token should be acquired");
        let bearer = tokens.bearer().await.expect("bearer");

        assert_eq!(bearer.expose_secret(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let status = tokens.status().await;
        assert!(status.acquired);
        assert!(!status.expired);
        assert_eq!(status.expires_at, None);
    }

    #[tokio::test]
    async fn long_lived_token_is_reused_without_new_grants() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(OAuthStub::new(&calls, Some(3600), StatusCode::OK)).await;
        let tokens = provider(&base_url);

        tokens.acquire().await.expect("token should be acquired");
        for _ in 0..3 {
            assert_eq!(tokens.bearer().await.expect("bearer").expose_secret(), "token-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_margin_is_capped_at_half_the_lifetime() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("timestamp");

        let hourly = CachedToken::issue("a".to_string().into(), Some(3600), now);
        assert_eq!(hourly.refresh_at, Some(now + Duration::seconds(3540)));

        let short = CachedToken::issue("b".to_string().into(), Some(45), now);
        assert_eq!(short.refresh_at, Some(now + Duration::seconds(23)));
        assert!(!short.needs_refresh(now));
        assert!(short.needs_refresh(now + Duration::seconds(23)));

        let forever = CachedToken::issue("c".to_string().into(), None, now);
        assert!(!forever.needs_refresh(now + Duration::days(365)));
        assert!(!forever.is_expired(now + Duration::days(365)));
    }

    #[tokio::test]
    async fn short_lived_token_is_reused_across_sends() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(OAuthStub::new(&calls, Some(45), StatusCode::OK)).await;
        let tokens = provider(&base_url);

        tokens.acquire().await.expect("token should be acquired");
        for _ in 0..10 {
            assert_eq!(tokens.bearer().await.expect("bearer").expose_secret(), "token-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_in_refresh_window_is_refreshed_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(OAuthStub::new(&calls, Some(2), StatusCode::OK)).await;
        let tokens = provider(&base_url);

        tokens.acquire().await.expect("token should be acquired");
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let bearer = tokens.bearer().await.expect("bearer");

        assert_eq!(bearer.expose_secret(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_unexpired_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = OAuthStub {
            fail_from_call: Some(2),
            ..OAuthStub::new(&calls, Some(4), StatusCode::OK)
        };
        let base_url = serve(stub).await;
        let tokens = provider(&base_url);

        tokens.acquire().await.expect("token should be acquired");
        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        let bearer = tokens.bearer().await.expect("previous token should still be served");

        assert_eq!(bearer.expose_secret(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_grant_is_a_status_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base_url = serve(OAuthStub::new(&calls, None, StatusCode::UNAUTHORIZED)).await;
        let tokens = provider(&base_url);

        let error = tokens.acquire().await.expect_err("grant should be rejected");

        assert_eq!(error.status(), Some(401));
        assert!(!tokens.status().await.acquired);
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_a_transport_error() {
        let tokens = provider("http://127.0.0.1:9");

        let error = tokens.acquire().await.expect_err("grant should fail");

        assert_eq!(error.service(), "oauth-token");
        assert_eq!(error.status(), None);
    }
}
