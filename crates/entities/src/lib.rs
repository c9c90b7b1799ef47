//! Clients for the company entity services: recognition of company mentions in
//! free text, and metadata lookup for a recognized company.

pub mod metadata;
pub mod recognizer;

pub use metadata::{HttpMetadataSource, MetadataSource};
pub use recognizer::{EntityRecognizer, HttpEntityRecognizer, RecognitionRequest};
