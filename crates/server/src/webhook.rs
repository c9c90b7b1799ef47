//! Inbound webhook endpoint.
//!
//! Every delivery is verified against the raw body before it is parsed.
//! Verification challenges are answered inline; qualifying messages are
//! acknowledged with 201 and processed on a detached task.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use companyinfo_core::{sign, verify, EventKind, InboundEvent, SIGNATURE_HEADER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{Dispatcher, Disposition, IgnoreReason};

pub const WEBHOOK_PATH: &str = "/companyinfo";

#[derive(Clone)]
pub struct WebhookState {
    webhook_secret: SecretString,
    dispatcher: Arc<Dispatcher>,
}

impl WebhookState {
    pub fn new(webhook_secret: SecretString, dispatcher: Arc<Dispatcher>) -> Self {
        Self { webhook_secret, dispatcher }
    }
}

#[derive(Debug, Serialize)]
struct ChallengeResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a Value>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route(WEBHOOK_PATH, post(companyinfo)).with_state(state)
}

async fn companyinfo(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let secret = state.webhook_secret.expose_secret().as_bytes();

    let provided = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    if let Err(error) = verify(secret, &body, provided) {
        warn!(
            event_name = "webhook.signature.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "invalid request signature"
        );
        return (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response();
    }

    let payload = match parse_object(&body) {
        Ok(payload) => payload,
        Err(reason) => {
            warn!(
                event_name = "webhook.body.rejected",
                correlation_id = %correlation_id,
                reason = %reason,
                "webhook body is not a JSON object"
            );
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    // Only the type decides whether the rest of the payload matters.
    let kind = EventKind::parse(payload.get("type").and_then(Value::as_str));
    if let EventKind::Other(event_type) = kind {
        debug!(
            event_name = "webhook.event.ignored",
            correlation_id = %correlation_id,
            event_type = %event_type,
            reason = IgnoreReason::UnsupportedType.as_str(),
            "ignoring webhook event"
        );
        return StatusCode::CREATED.into_response();
    }

    let event = match serde_json::from_value::<InboundEvent>(Value::Object(payload)) {
        Ok(event) => event,
        Err(error) => {
            warn!(
                event_name = "webhook.event.undecodable",
                correlation_id = %correlation_id,
                error = %error,
                "acknowledging webhook event with unexpected field types"
            );
            return StatusCode::CREATED.into_response();
        }
    };

    match state.dispatcher.classify(&event) {
        Disposition::Challenge => challenge_response(secret, &event, &correlation_id),
        Disposition::Ignored(reason) => {
            debug!(
                event_name = "webhook.event.ignored",
                correlation_id = %correlation_id,
                event_type = event.event_type.as_deref().unwrap_or("unknown"),
                reason = reason.as_str(),
                "ignoring webhook event"
            );
            StatusCode::CREATED.into_response()
        }
        Disposition::Process => {
            info!(
                event_name = "webhook.message.accepted",
                correlation_id = %correlation_id,
                space_id = event.space_id.as_deref().unwrap_or("unknown"),
                message_id = event.message_id.as_deref().unwrap_or("unknown"),
                "got a message"
            );
            state.dispatcher.spawn(event, correlation_id);
            StatusCode::CREATED.into_response()
        }
    }
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, String> {
    match serde_json::from_slice(body).map_err(|error| format!("invalid JSON body: {error}"))? {
        Value::Object(payload) => Ok(payload),
        _ => Err("webhook body must be a JSON object".to_string()),
    }
}

fn challenge_response(secret: &[u8], event: &InboundEvent, correlation_id: &str) -> Response {
    info!(
        event_name = "webhook.challenge.received",
        correlation_id,
        "got webhook verification challenge"
    );

    let signed = serde_json::to_string(&ChallengeResponse { response: event.challenge.as_ref() })
        .map_err(|error| error.to_string())
        .and_then(|body| {
            let signature = sign(secret, body.as_bytes()).map_err(|error| error.to_string())?;
            let signature =
                HeaderValue::from_str(&signature).map_err(|error| error.to_string())?;
            Ok((body, signature))
        });

    match signed {
        Ok((body, signature)) => {
            let mut response = (StatusCode::OK, body).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(HeaderName::from_static(SIGNATURE_HEADER), signature);
            response
        }
        Err(message) => {
            error!(
                event_name = "webhook.challenge.failed",
                correlation_id,
                error = %message,
                "could not sign challenge response"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
