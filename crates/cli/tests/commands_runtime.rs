use std::env;
use std::sync::{Mutex, OnceLock};

use crmpilot_cli::commands::chat::{self, ChatOptions};
use crmpilot_cli::commands::{config, doctor};
use serde_json::Value;

const MISSING_PROVIDER: &str = "crmpilot-provider-that-does-not-exist";

#[test]
fn config_reports_redacted_secrets_with_sources() {
    with_env(
        &[
            ("HUBSPOT_ACCESS_TOKEN", "pat-na1-very-secret"),
            ("CRMPILOT_CLASSIFIER_MODEL", "llama-3.3-70b-versatile"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "expected config report");
            assert!(!result.output.contains("very-secret"));

            let payload = parse_payload(&result.output);
            let token = entry(&payload, "hubspot.access_token");
            assert_eq!(token["value"], "pat-***");
            assert_eq!(token["source"], "env (HUBSPOT_ACCESS_TOKEN)");

            let model = entry(&payload, "classifier.model");
            assert_eq!(model["value"], "llama-3.3-70b-versatile");
            assert_eq!(model["source"], "env (CRMPILOT_CLASSIFIER_MODEL)");

            let key = entry(&payload, "classifier.api_key");
            assert_eq!(key["value"], "<unset>");
            assert_eq!(key["source"], "default");
        },
    );
}

#[test]
fn config_returns_failure_for_invalid_env() {
    with_env(&[("CRMPILOT_CLASSIFIER_TIMEOUT_SECS", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_fails_when_provider_cannot_start() {
    with_env(&[("CRMPILOT_PROVIDER_COMMAND", MISSING_PROVIDER)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1, "expected doctor failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(check(&payload, "config_validation")["status"], "pass");
        assert_eq!(check(&payload, "classifier_credential")["status"], "warn");
        assert_eq!(check(&payload, "hubspot_token")["status"], "warn");
        assert_eq!(check(&payload, "provider_catalog")["status"], "fail");
    });
}

#[test]
fn doctor_skips_checks_when_config_invalid() {
    with_env(&[("CRMPILOT_LOG_FORMAT", "xml")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] provider_catalog:"));
    });
}

#[test]
fn chat_fails_fast_when_provider_cannot_start() {
    with_env(&[], || {
        let result = chat::run(ChatOptions {
            server: Some(MISSING_PROVIDER.to_string()),
            server_args: Vec::new(),
        });
        assert_eq!(result.exit_code, 4, "expected provider connect failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["error_class"], "provider_connect");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn entry<'a>(payload: &'a Value, key: &str) -> &'a Value {
    payload["entries"]
        .as_array()
        .and_then(|entries| entries.iter().find(|entry| entry["key"] == key))
        .unwrap_or_else(|| panic!("missing config entry `{key}`"))
}

fn check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .unwrap_or_else(|| panic!("missing doctor check `{name}`"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CRMPILOT_CLASSIFIER_API_KEY",
        "GROQ_API_KEY",
        "CRMPILOT_CLASSIFIER_BASE_URL",
        "CRMPILOT_CLASSIFIER_MODEL",
        "CRMPILOT_CLASSIFIER_TEMPERATURE",
        "CRMPILOT_CLASSIFIER_TIMEOUT_SECS",
        "CRMPILOT_PROVIDER_COMMAND",
        "CRMPILOT_PROVIDER_ARGS",
        "CRMPILOT_PROVIDER_CALL_TIMEOUT_SECS",
        "CRMPILOT_HUBSPOT_ACCESS_TOKEN",
        "HUBSPOT_ACCESS_TOKEN",
        "CRMPILOT_HUBSPOT_BASE_URL",
        "CRMPILOT_HUBSPOT_TIMEOUT_SECS",
        "CRMPILOT_LOGGING_LEVEL",
        "CRMPILOT_LOGGING_FORMAT",
        "CRMPILOT_LOG_LEVEL",
        "CRMPILOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
