use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use companyinfo_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", error),
    };

    CommandResult { exit_code: 0, output: render(&config) }
}

/// Renders one line per key: `- key = value (source: ...)`. Secrets never
/// appear in the output.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let entries = [
        ("app.id", config.app.id.clone(), source("app.id", &["COMPANYINFO_APP_ID"])),
        (
            "app.secret",
            redact_secret(&config.app.secret),
            source("app.secret", &["COMPANYINFO_APP_SECRET"]),
        ),
        (
            "app.webhook_secret",
            redact_secret(&config.app.webhook_secret),
            source("app.webhook_secret", &["COMPANYINFO_WEBHOOK_SECRET"]),
        ),
        (
            "watson.api_base_url",
            config.watson.api_base_url.clone(),
            source("watson.api_base_url", &["COMPANYINFO_API_BASE_URL"]),
        ),
        (
            "entities.user_id",
            config.entities.user_id.clone(),
            source("entities.user_id", &["COMPANYINFO_FR_USER_ID"]),
        ),
        (
            "entities.key",
            redact_secret(&config.entities.key),
            source("entities.key", &["COMPANYINFO_FR_KEY"]),
        ),
        (
            "entities.recognition_url",
            config.entities.recognition_url.clone(),
            source("entities.recognition_url", &["COMPANYINFO_FR_ER_URL"]),
        ),
        (
            "entities.metadata_url",
            config.entities.metadata_url.clone(),
            source("entities.metadata_url", &["COMPANYINFO_FR_METADATA_URL"]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["COMPANYINFO_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.port",
            config.server.port.to_string(),
            source("server.port", &["PORT", "COMPANYINFO_SERVER_PORT"]),
        ),
        (
            "http.timeout_secs",
            config.http.timeout_secs.to_string(),
            source("http.timeout_secs", &["COMPANYINFO_HTTP_TIMEOUT_SECS"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["COMPANYINFO_LOGGING_LEVEL", "COMPANYINFO_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            config.logging.format.as_str().to_string(),
            source("logging.format", &["COMPANYINFO_LOGGING_FORMAT", "COMPANYINFO_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(|(key, value, source)| render_line(key, value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["companyinfo.toml", "config/companyinfo.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
