use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.watsonwork.ibm.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app: AppCredentials,
    pub watson: WatsonConfig,
    pub entities: EntitiesConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AppCredentials {
    pub id: String,
    pub secret: SecretString,
    pub webhook_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct WatsonConfig {
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct EntitiesConfig {
    pub user_id: String,
    pub key: SecretString,
    pub recognition_url: String,
    pub metadata_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base_url: Option<String>,
    pub entities_user_id: Option<String>,
    pub entities_key: Option<String>,
    pub recognition_url: Option<String>,
    pub metadata_url: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced in the config file but not set")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` without a closing `}}` in the config file")]
    UnterminatedInterpolation,
    #[error("`{key}` has an unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppCredentials {
                id: String::new(),
                secret: String::new().into(),
                webhook_secret: String::new().into(),
            },
            watson: WatsonConfig { api_base_url: DEFAULT_API_BASE_URL.to_string() },
            entities: EntitiesConfig {
                user_id: String::new(),
                key: String::new().into(),
                recognition_url: String::new(),
                metadata_url: String::new(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3000 },
            http: HttpConfig { timeout_secs: 30 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        [Self::Compact, Self::Pretty, Self::Json]
            .into_iter()
            .find(|format| format.as_str() == normalized)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "logging.format `{normalized}` is not one of compact|pretty|json"
                ))
            })
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("companyinfo.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Address the webhook listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(app) = patch.app {
            if let Some(id) = app.id {
                self.app.id = id;
            }
            if let Some(secret) = app.secret {
                self.app.secret = secret_value(secret);
            }
            if let Some(webhook_secret) = app.webhook_secret {
                self.app.webhook_secret = secret_value(webhook_secret);
            }
        }

        if let Some(watson) = patch.watson {
            if let Some(api_base_url) = watson.api_base_url {
                self.watson.api_base_url = api_base_url;
            }
        }

        if let Some(entities) = patch.entities {
            if let Some(user_id) = entities.user_id {
                self.entities.user_id = user_id;
            }
            if let Some(key) = entities.key {
                self.entities.key = secret_value(key);
            }
            if let Some(recognition_url) = entities.recognition_url {
                self.entities.recognition_url = recognition_url;
            }
            if let Some(metadata_url) = entities.metadata_url {
                self.entities.metadata_url = metadata_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COMPANYINFO_APP_ID") {
            self.app.id = value;
        }
        if let Some(value) = read_env("COMPANYINFO_APP_SECRET") {
            self.app.secret = secret_value(value);
        }
        if let Some(value) = read_env("COMPANYINFO_WEBHOOK_SECRET") {
            self.app.webhook_secret = secret_value(value);
        }

        if let Some(value) = read_env("COMPANYINFO_API_BASE_URL") {
            self.watson.api_base_url = value;
        }

        if let Some(value) = read_env("COMPANYINFO_FR_USER_ID") {
            self.entities.user_id = value;
        }
        if let Some(value) = read_env("COMPANYINFO_FR_KEY") {
            self.entities.key = secret_value(value);
        }
        if let Some(value) = read_env("COMPANYINFO_FR_ER_URL") {
            self.entities.recognition_url = value;
        }
        if let Some(value) = read_env("COMPANYINFO_FR_METADATA_URL") {
            self.entities.metadata_url = value;
        }

        if let Some(value) = read_env("COMPANYINFO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COMPANYINFO_SERVER_PORT") {
            self.server.port = parse_env("COMPANYINFO_SERVER_PORT", &value)?;
        }
        // hosting platforms hand the listener port over as plain PORT
        if let Some(value) = read_env("PORT") {
            self.server.port = parse_env("PORT", &value)?;
        }

        if let Some(value) = read_env("COMPANYINFO_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_env("COMPANYINFO_HTTP_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("COMPANYINFO_LOGGING_LEVEL").or_else(|| read_env("COMPANYINFO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COMPANYINFO_LOGGING_FORMAT").or_else(|| read_env("COMPANYINFO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(app_id) = overrides.app_id {
            self.app.id = app_id;
        }
        if let Some(app_secret) = overrides.app_secret {
            self.app.secret = secret_value(app_secret);
        }
        if let Some(webhook_secret) = overrides.webhook_secret {
            self.app.webhook_secret = secret_value(webhook_secret);
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.watson.api_base_url = api_base_url;
        }
        if let Some(user_id) = overrides.entities_user_id {
            self.entities.user_id = user_id;
        }
        if let Some(key) = overrides.entities_key {
            self.entities.key = secret_value(key);
        }
        if let Some(recognition_url) = overrides.recognition_url {
            self.entities.recognition_url = recognition_url;
        }
        if let Some(metadata_url) = overrides.metadata_url {
            self.entities.metadata_url = metadata_url;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_app(&self.app)?;
        validate_watson(&self.watson)?;
        validate_entities(&self.entities)?;
        validate_server(&self.server)?;
        validate_http(&self.http)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("companyinfo.toml"), PathBuf::from("config/companyinfo.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references from the process environment.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_app(app: &AppCredentials) -> Result<(), ConfigError> {
    if app.id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "app.id is required (COMPANYINFO_APP_ID). Find it on the app's registration page"
                .to_string(),
        ));
    }
    if app.secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "app.secret is required (COMPANYINFO_APP_SECRET)".to_string(),
        ));
    }
    if app.webhook_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "app.webhook_secret is required (COMPANYINFO_WEBHOOK_SECRET). It is shown once when the webhook is registered".to_string(),
        ));
    }
    Ok(())
}

fn validate_watson(watson: &WatsonConfig) -> Result<(), ConfigError> {
    require_http_url("watson.api_base_url", &watson.api_base_url)
}

fn validate_entities(entities: &EntitiesConfig) -> Result<(), ConfigError> {
    if entities.user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "entities.user_id is required (COMPANYINFO_FR_USER_ID)".to_string(),
        ));
    }
    if entities.key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "entities.key is required (COMPANYINFO_FR_KEY)".to_string(),
        ));
    }
    require_http_url("entities.recognition_url", &entities.recognition_url)?;
    require_http_url("entities.metadata_url", &entities.metadata_url)?;

    let has_placeholder =
        entities.metadata_url.contains("%s") || entities.metadata_url.contains("{id}");
    if !has_placeholder {
        return Err(ConfigError::Validation(
            "entities.metadata_url must contain a `%s` or `{id}` placeholder for the entity id"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    app: Option<AppPatch>,
    watson: Option<WatsonPatch>,
    entities: Option<EntitiesPatch>,
    server: Option<ServerPatch>,
    http: Option<HttpPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AppPatch {
    id: Option<String>,
    secret: Option<String>,
    webhook_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WatsonPatch {
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EntitiesPatch {
    user_id: Option<String>,
    key: Option<String>,
    recognition_url: Option<String>,
    metadata_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
