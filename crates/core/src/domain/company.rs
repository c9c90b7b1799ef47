use serde::{Deserialize, Serialize};

/// Entities scoring below this are never looked up.
pub const MIN_ENTITY_SCORE: f64 = 60.0;

/// A company mention found by the recognition service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub id: String,
    pub score: f64,
}

impl RecognizedEntity {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self { id: id.into(), score }
    }

    pub fn is_relevant(&self) -> bool {
        self.score >= MIN_ENTITY_SCORE
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
    #[serde(default)]
    pub name: String,
}

impl NamedItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMetadata {
    pub name: String,
    pub languages: Vec<NamedItem>,
    pub industries: Vec<NamedItem>,
    pub sectors: Vec<NamedItem>,
    pub segments: Vec<NamedItem>,
}

pub fn join_names(items: &[NamedItem], separator: &str) -> String {
    items.iter().map(|item| item.name.as_str()).collect::<Vec<_>>().join(separator)
}
