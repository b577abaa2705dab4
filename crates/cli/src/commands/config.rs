use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crmpilot_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    precedence: &'static str,
    config_file: Option<String>,
    entries: Vec<ConfigEntry>,
}

struct SourceLookup {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceLookup {
    fn detect() -> Self {
        let path = resolve_config_path(None);
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn entry(&self, key: &'static str, value: impl Into<String>, env_keys: &[&str]) -> ConfigEntry {
        ConfigEntry { key, value: value.into(), source: self.field_source(key, env_keys) }
    }

    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let sources = SourceLookup::detect();
    let report = ConfigReport {
        precedence: "override > env > file > default",
        config_file: sources.path.as_deref().map(|path| path.display().to_string()),
        entries: entries(&config, &sources),
    };
    CommandResult::report(0, &report)
}

fn entries(config: &AppConfig, sources: &SourceLookup) -> Vec<ConfigEntry> {
    let classifier = &config.classifier;
    let provider = &config.provider;
    let hubspot = &config.hubspot;
    let logging = &config.logging;

    vec![
        sources.entry(
            "classifier.api_key",
            redact_secret(classifier.api_key.as_ref()),
            &["CRMPILOT_CLASSIFIER_API_KEY", "GROQ_API_KEY"],
        ),
        sources.entry("classifier.base_url", &classifier.base_url, &["CRMPILOT_CLASSIFIER_BASE_URL"]),
        sources.entry("classifier.model", &classifier.model, &["CRMPILOT_CLASSIFIER_MODEL"]),
        sources.entry(
            "classifier.temperature",
            classifier.temperature.to_string(),
            &["CRMPILOT_CLASSIFIER_TEMPERATURE"],
        ),
        sources.entry(
            "classifier.timeout_secs",
            classifier.timeout_secs.to_string(),
            &["CRMPILOT_CLASSIFIER_TIMEOUT_SECS"],
        ),
        sources.entry("provider.command", &provider.command, &["CRMPILOT_PROVIDER_COMMAND"]),
        sources.entry("provider.args", provider.args.join(" "), &["CRMPILOT_PROVIDER_ARGS"]),
        sources.entry(
            "provider.call_timeout_secs",
            provider.call_timeout_secs.to_string(),
            &["CRMPILOT_PROVIDER_CALL_TIMEOUT_SECS"],
        ),
        sources.entry(
            "hubspot.access_token",
            redact_secret(hubspot.access_token.as_ref()),
            &["CRMPILOT_HUBSPOT_ACCESS_TOKEN", "HUBSPOT_ACCESS_TOKEN"],
        ),
        sources.entry("hubspot.base_url", &hubspot.base_url, &["CRMPILOT_HUBSPOT_BASE_URL"]),
        sources.entry(
            "hubspot.timeout_secs",
            hubspot.timeout_secs.to_string(),
            &["CRMPILOT_HUBSPOT_TIMEOUT_SECS"],
        ),
        sources.entry(
            "logging.level",
            &logging.level,
            &["CRMPILOT_LOGGING_LEVEL", "CRMPILOT_LOG_LEVEL"],
        ),
        sources.entry(
            "logging.format",
            format!("{:?}", logging.format).to_ascii_lowercase(),
            &["CRMPILOT_LOGGING_FORMAT", "CRMPILOT_LOG_FORMAT"],
        ),
    ]
}

fn env_is_set(key: &str) -> bool {
    env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
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

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
