use serde::{Deserialize, Serialize};

use crate::domain::company::{join_names, CompanyMetadata};

pub const APP_MESSAGE_COLOR: &str = "#6CB7FB";

/// Renders the company summary posted back into the space.
///
/// Industries are comma-joined without a space, sectors and segments with `", "`.
pub fn compose_company_message(info: &CompanyMetadata) -> String {
    format!(
        "*Company*\n{}\n*Industries*\n{}\n*Sectors*\n{}\n*Segments*\n{}\n",
        info.name,
        join_names(&info.industries, ","),
        join_names(&info.sectors, ", "),
        join_names(&info.segments, ", "),
    )
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: f64,
    pub color: String,
    pub text: String,
}

/// Body of a message posted by the app into a space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: f64,
    pub annotations: Vec<Annotation>,
}

impl AppMessage {
    pub fn generic(text: impl Into<String>) -> Self {
        Self {
            kind: "appMessage".to_string(),
            version: 1.0,
            annotations: vec![Annotation {
                kind: "generic".to_string(),
                version: 1.0,
                color: APP_MESSAGE_COLOR.to_string(),
                text: text.into(),
            }],
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.annotations.first().map(|annotation| annotation.text.as_str())
    }
}
