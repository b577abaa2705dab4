use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["crmpilot.toml", "config/crmpilot.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub provider: ProviderConfig,
    pub hubspot: HubSpotConfig,
    pub logging: LoggingConfig,
}

/// Chat-completion service used to classify free text into an operation.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Tool provider process spawned by the session and spoken to over MCP stdio.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub command: String,
    pub args: Vec<String>,
    pub call_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct HubSpotConfig {
    pub access_token: Option<SecretString>,
    pub base_url: String,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub classifier_api_key: Option<String>,
    pub classifier_base_url: Option<String>,
    pub classifier_model: Option<String>,
    pub provider_command: Option<String>,
    pub provider_args: Option<Vec<String>>,
    pub hubspot_access_token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama-3.1-8b-instant".to_string(),
                temperature: 0.1,
                timeout_secs: 30,
            },
            provider: ProviderConfig {
                command: "crmpilot-mcp".to_string(),
                args: Vec::new(),
                call_timeout_secs: 30,
            },
            hubspot: HubSpotConfig {
                access_token: None,
                base_url: "https://api.hubapi.com/crm/v3".to_string(),
                timeout_secs: 15,
            },
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
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ClassifierConfig {
    /// Credential to use, if any. Blank keys count as absent.
    pub fn credential(&self) -> Option<&SecretString> {
        self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty())
    }
}

impl HubSpotConfig {
    pub fn require_access_token(&self) -> Result<&SecretString, ConfigError> {
        self.access_token.as_ref().filter(|token| !token.expose_secret().trim().is_empty()).ok_or_else(
            || {
                ConfigError::Validation(
                    "hubspot.access_token is required to serve CRM tools (set HUBSPOT_ACCESS_TOKEN or CRMPILOT_HUBSPOT_ACCESS_TOKEN)"
                        .to_string(),
                )
            },
        )
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
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(classifier) = patch.classifier {
            if let Some(api_key) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = base_url;
            }
            if let Some(model) = classifier.model {
                self.classifier.model = model;
            }
            if let Some(temperature) = classifier.temperature {
                self.classifier.temperature = temperature;
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(provider) = patch.provider {
            if let Some(command) = provider.command {
                self.provider.command = command;
            }
            if let Some(args) = provider.args {
                self.provider.args = args;
            }
            if let Some(call_timeout_secs) = provider.call_timeout_secs {
                self.provider.call_timeout_secs = call_timeout_secs;
            }
        }

        if let Some(hubspot) = patch.hubspot {
            if let Some(access_token) = hubspot.access_token {
                self.hubspot.access_token = Some(secret_value(access_token));
            }
            if let Some(base_url) = hubspot.base_url {
                self.hubspot.base_url = base_url;
            }
            if let Some(timeout_secs) = hubspot.timeout_secs {
                self.hubspot.timeout_secs = timeout_secs;
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
        let classifier_key =
            read_env("CRMPILOT_CLASSIFIER_API_KEY").or_else(|| read_env("GROQ_API_KEY"));
        if let Some(value) = classifier_key {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CRMPILOT_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = value;
        }
        if let Some(value) = read_env("CRMPILOT_CLASSIFIER_MODEL") {
            self.classifier.model = value;
        }
        if let Some(value) = read_env("CRMPILOT_CLASSIFIER_TEMPERATURE") {
            self.classifier.temperature = parse_f32("CRMPILOT_CLASSIFIER_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("CRMPILOT_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("CRMPILOT_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CRMPILOT_PROVIDER_COMMAND") {
            self.provider.command = value;
        }
        if let Some(value) = read_env("CRMPILOT_PROVIDER_ARGS") {
            self.provider.args = value.split_whitespace().map(str::to_string).collect();
        }
        if let Some(value) = read_env("CRMPILOT_PROVIDER_CALL_TIMEOUT_SECS") {
            self.provider.call_timeout_secs =
                parse_u64("CRMPILOT_PROVIDER_CALL_TIMEOUT_SECS", &value)?;
        }

        let hubspot_token =
            read_env("CRMPILOT_HUBSPOT_ACCESS_TOKEN").or_else(|| read_env("HUBSPOT_ACCESS_TOKEN"));
        if let Some(value) = hubspot_token {
            self.hubspot.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CRMPILOT_HUBSPOT_BASE_URL") {
            self.hubspot.base_url = value;
        }
        if let Some(value) = read_env("CRMPILOT_HUBSPOT_TIMEOUT_SECS") {
            self.hubspot.timeout_secs = parse_u64("CRMPILOT_HUBSPOT_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("CRMPILOT_LOGGING_LEVEL").or_else(|| read_env("CRMPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CRMPILOT_LOGGING_FORMAT").or_else(|| read_env("CRMPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.classifier_api_key {
            self.classifier.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.classifier_base_url {
            self.classifier.base_url = base_url;
        }
        if let Some(model) = overrides.classifier_model {
            self.classifier.model = model;
        }
        if let Some(command) = overrides.provider_command {
            self.provider.command = command;
        }
        if let Some(args) = overrides.provider_args {
            self.provider.args = args;
        }
        if let Some(access_token) = overrides.hubspot_access_token {
            self.hubspot.access_token = Some(secret_value(access_token));
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_classifier(&self.classifier)?;
        validate_provider(&self.provider)?;
        validate_hubspot(&self.hubspot)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    validate_http_url("classifier.base_url", &classifier.base_url)?;

    if classifier.model.trim().is_empty() {
        return Err(ConfigError::Validation("classifier.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&classifier.temperature) {
        return Err(ConfigError::Validation(
            "classifier.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    validate_timeout("classifier.timeout_secs", classifier.timeout_secs)
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    if provider.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "provider.command must name the tool provider executable".to_string(),
        ));
    }

    validate_timeout("provider.call_timeout_secs", provider.call_timeout_secs)
}

fn validate_hubspot(hubspot: &HubSpotConfig) -> Result<(), ConfigError> {
    validate_http_url("hubspot.base_url", &hubspot.base_url)?;
    validate_timeout("hubspot.timeout_secs", hubspot.timeout_secs)
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

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    classifier: Option<ClassifierPatch>,
    provider: Option<ProviderPatch>,
    hubspot: Option<HubSpotPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderPatch {
    command: Option<String>,
    args: Option<Vec<String>>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HubSpotPatch {
    access_token: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
