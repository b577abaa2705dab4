//! Classifier adapter: asks the completion service which catalog operation a
//! piece of text names, and turns whatever comes back into a decision.
//!
//! Every failure mode (no credential, timeout, bad status, prose instead of
//! JSON) collapses into a degraded decision for [`Operation::FALLBACK`]; the
//! caller never sees an error from here.

use std::sync::Arc;
use std::time::Duration;

use crmpilot_core::{
    ClassificationError, ClassifierDecision, DecisionOrigin, Operation, OperationCatalog,
    ParamValue, Parameters,
};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::llm::{LlmClient, LlmError};

/// Confidence reported when the classifier was tried and failed.
pub const DEGRADED_CONFIDENCE: f64 = 0.5;
/// Confidence reported when no classifier is configured at all.
pub const UNCONFIGURED_CONFIDENCE: f64 = 0.0;
/// Parameter that carries the raw text on the fallback operation.
pub const FALLBACK_PARAMETER: &str = "question";
/// Upper bound on how much of a reply the fragment scanner looks at.
pub const MAX_SCAN_BYTES: usize = 64 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const SYSTEM_INSTRUCTION: &str = "You are a professional tool router. Return valid JSON only.";

#[derive(Clone)]
pub struct ClassifierAdapter {
    client: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl Default for ClassifierAdapter {
    fn default() -> Self {
        Self::unconfigured()
    }
}

impl ClassifierAdapter {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client: Some(client), timeout }
    }

    /// Adapter with no credential: every text degrades without network I/O.
    pub fn unconfigured() -> Self {
        Self { client: None, timeout: DEFAULT_TIMEOUT }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub async fn classify(&self, text: &str, catalog: &OperationCatalog) -> ClassifierDecision {
        let Some(client) = &self.client else {
            return degraded_decision(text, ClassificationError::MissingCredential);
        };

        let prompt = build_prompt(text, catalog);
        let reply = match tokio::time::timeout(
            self.timeout,
            client.complete(SYSTEM_INSTRUCTION, &prompt),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(error)) => {
                return degraded_decision(text, self.map_llm_error(error));
            }
            Err(_) => {
                return degraded_decision(
                    text,
                    ClassificationError::Timeout { timeout_secs: self.timeout.as_secs() },
                );
            }
        };

        match decode_reply(&reply) {
            Ok(decision) => {
                debug!(
                    event_name = "agent.classifier.decided",
                    operation = %decision.operation_name,
                    confidence = decision.confidence,
                    "classifier produced a decision"
                );
                decision
            }
            Err(reason) => degraded_decision(text, reason),
        }
    }

    fn map_llm_error(&self, error: LlmError) -> ClassificationError {
        match error {
            LlmError::Timeout => {
                ClassificationError::Timeout { timeout_secs: self.timeout.as_secs() }
            }
            LlmError::Transport(message) => ClassificationError::Transport(message),
            LlmError::Status { status, .. } => ClassificationError::UnexpectedStatus { status },
            LlmError::Malformed(message) => ClassificationError::MalformedBody(message),
        }
    }
}

/// Fallback decision carrying the raw text as the general question.
pub fn degraded_decision(text: &str, reason: ClassificationError) -> ClassifierDecision {
    let confidence = match reason {
        ClassificationError::MissingCredential => {
            debug!(
                event_name = "agent.classifier.unconfigured",
                fallback = Operation::FALLBACK.name(),
                "no classifier credential, routing to fallback operation"
            );
            UNCONFIGURED_CONFIDENCE
        }
        _ => {
            warn!(
                event_name = "agent.classifier.degraded",
                reason = %reason,
                fallback = Operation::FALLBACK.name(),
                "classifier unavailable, routing to fallback operation"
            );
            DEGRADED_CONFIDENCE
        }
    };

    let mut parameters = Parameters::new();
    parameters.insert(FALLBACK_PARAMETER.to_string(), ParamValue::Text(text.to_string()));
    ClassifierDecision {
        operation_name: Operation::FALLBACK.name().to_string(),
        parameters,
        confidence,
        origin: DecisionOrigin::Degraded(reason),
    }
}

pub fn build_prompt(text: &str, catalog: &OperationCatalog) -> String {
    let rules = catalog
        .known_operations()
        .iter()
        .map(|operation| format!("- {}", operation.routing_rule()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "USER QUERY: {text:?}\n\
         TOOLS: {tools}\n\
         \n\
         RULES:\n\
         {rules}\n\
         - Choose exactly one tool from TOOLS.\n\
         \n\
         RETURN JSON ONLY: {{\"tool\": \"name\", \"params\": {{}}, \"confidence\": 0.0}}",
        tools = catalog.listing(),
    )
}

/// Turns a raw completion reply into a decision, or the reason it could not.
pub fn decode_reply(reply: &str) -> Result<ClassifierDecision, ClassificationError> {
    let fragment = find_json_object(reply).ok_or(ClassificationError::NoStructuredFragment)?;
    let value: Value = serde_json::from_str(fragment)
        .map_err(|error| ClassificationError::InvalidFragment(error.to_string()))?;

    let operation_name = value
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ClassificationError::InvalidFragment("missing `tool` name".to_string()))?
        .to_string();

    let parameters =
        value.get("params").and_then(Value::as_object).map(normalize_parameters).unwrap_or_default();

    let confidence = value.get("confidence").and_then(read_confidence).unwrap_or(0.0);

    Ok(ClassifierDecision {
        operation_name,
        parameters,
        confidence,
        origin: DecisionOrigin::Classifier,
    })
}

fn read_confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.clamp(0.0, 1.0))
}

fn normalize_parameters(raw: &Map<String, Value>) -> Parameters {
    raw.iter()
        .filter_map(|(key, value)| normalize_value(value).map(|value| (key.clone(), value)))
        .collect()
}

fn normalize_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::String(text) => Some(ParamValue::Text(text.clone())),
        Value::Number(number) => Some(normalize_number(number)),
        Value::Bool(flag) => Some(ParamValue::Text(flag.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn normalize_number(number: &Number) -> ParamValue {
    if let Some(integer) = number.as_i64() {
        return ParamValue::Integer(integer);
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
            ParamValue::Integer(float as i64)
        }
        _ => ParamValue::Text(number.to_string()),
    }
}

/// Earliest-starting balanced `{...}` span in `text`, if any.
///
/// Quotes and escapes are honoured once inside an object, so braces inside
/// string values do not count. Only the first [`MAX_SCAN_BYTES`] are examined.
pub fn find_json_object(text: &str) -> Option<&str> {
    let mut open = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, &byte) in text.as_bytes().iter().enumerate().take(MAX_SCAN_BYTES) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(index),
            b'}' => {
                let Some(start) = open.pop() else {
                    continue;
                };
                if best.map_or(true, |(best_start, _)| start < best_start) {
                    best = Some((start, index));
                }
                if open.is_empty() {
                    break;
                }
            }
            _ => {}
        }
    }

    best.map(|(start, end)| &text[start..=end])
}
