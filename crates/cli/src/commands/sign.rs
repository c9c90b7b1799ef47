use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use companyinfo_core::config::{AppConfig, LoadOptions};
use companyinfo_core::sign;
use secrecy::ExposeSecret;

use crate::commands::{CommandResult, EXIT_RUNTIME};

const COMMAND: &str = "sign";

#[derive(Debug, Clone)]
pub enum SignInput {
    Body(String),
    File(PathBuf),
}

impl SignInput {
    fn read(self) -> anyhow::Result<Vec<u8>> {
        match self {
            Self::Body(body) => Ok(body.into_bytes()),
            Self::File(path) => {
                fs::read(&path).with_context(|| format!("failed to read `{}`", path.display()))
            }
        }
    }
}

/// Prints the hex signature the platform would send for `input`. Without an
/// explicit secret the configured webhook secret is used, which requires the
/// full configuration to validate.
pub fn run(input: SignInput, secret: Option<String>) -> CommandResult {
    let secret = match secret {
        Some(secret) => secret,
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.app.webhook_secret.expose_secret().to_string(),
            Err(error) => return CommandResult::config_failure(COMMAND, error),
        },
    };

    let body = match input.read() {
        Ok(body) => body,
        Err(error) => {
            return CommandResult::failure(COMMAND, "input", format!("{error:#}"), EXIT_RUNTIME)
        }
    };

    match sign(secret.as_bytes(), &body) {
        Ok(signature) => CommandResult::success(COMMAND, signature),
        Err(error) => CommandResult::failure(COMMAND, "signature", error.to_string(), EXIT_RUNTIME),
    }
}
