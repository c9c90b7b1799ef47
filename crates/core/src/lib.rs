pub mod config;
pub mod domain;
pub mod errors;
pub mod message;
pub mod signature;

pub use domain::company::{CompanyMetadata, NamedItem, RecognizedEntity, MIN_ENTITY_SCORE};
pub use domain::event::{EventKind, InboundEvent};
pub use errors::{ServiceError, SignatureError};
pub use message::{compose_company_message, AppMessage};
pub use signature::{sign, verify, SIGNATURE_HEADER};
