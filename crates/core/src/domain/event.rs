use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MESSAGE_CREATED: &str = "message-created";
pub const VERIFICATION: &str = "verification";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    MessageCreated,
    Verification,
    Other(String),
}

impl EventKind {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(MESSAGE_CREATED) => Self::MessageCreated,
            Some(VERIFICATION) => Self::Verification,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }
}

/// A webhook delivery from the workspace platform.
///
/// Every field is optional on the wire. `time` is epoch milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "epoch_millis")]
    pub time: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub challenge: Option<Value>,
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(self.event_type.as_deref())
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    /// Message text, or `None` when absent or empty.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|content| !content.is_empty())
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.time.and_then(DateTime::from_timestamp_millis)
    }
}

/// Accepts any JSON number, including exponent forms such as `1.49e12`.
/// Anything that is not a representable number is treated as absent.
fn epoch_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| {
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|millis| millis.is_finite() && millis.abs() < i64::MAX as f64)
                .map(|millis| millis as i64)
        })
    }))
}
