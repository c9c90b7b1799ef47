//! Watson Work platform client
//!
//! Outbound side of the integration with the workspace platform:
//! - **OAuth** (`oauth`) - client-credentials token acquisition and refresh
//! - **Messages** (`messages`) - posting app messages into a space
//!
//! Every call authenticates with the bearer token held by [`oauth::TokenProvider`],
//! which is built once at startup and shared behind an `Arc`.

pub mod messages;
pub mod oauth;

pub use messages::{MessageSender, WatsonMessageSender};
pub use oauth::{TokenProvider, TokenStatus};

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}
