use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ClassificationError, DispatchError};

/// Primitive parameter value carried by an invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Text(String),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(value) => Value::from(*value),
            Self::Text(value) => Value::from(value.as_str()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Flat parameter mapping. Ordered so that two equal requests render identically.
pub type Parameters = BTreeMap<String, ParamValue>;

pub fn parameters_to_json(parameters: &Parameters) -> Map<String, Value> {
    parameters.iter().map(|(key, value)| (key.clone(), value.to_json())).collect()
}

/// A fully resolved request, ready for the dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvocationRequest {
    pub operation_name: String,
    pub parameters: Parameters,
    pub confidence: f64,
}

impl InvocationRequest {
    pub fn new(operation_name: impl Into<String>, parameters: Parameters, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self { operation_name: operation_name.into(), parameters, confidence }
    }

    pub fn arguments(&self) -> Map<String, Value> {
        parameters_to_json(&self.parameters)
    }

    pub fn describe_parameters(&self) -> String {
        let rendered = self
            .parameters
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{rendered}}}")
    }
}

/// Where a classifier decision came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionOrigin {
    Classifier,
    Degraded(ClassificationError),
}

/// Per-text classifier output, folded into an [`InvocationRequest`] by the resolver.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierDecision {
    pub operation_name: String,
    pub parameters: Parameters,
    pub confidence: f64,
    pub origin: DecisionOrigin,
}

impl ClassifierDecision {
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, DecisionOrigin::Degraded(_))
    }

    pub fn into_request(self) -> InvocationRequest {
        InvocationRequest::new(self.operation_name, self.parameters, self.confidence)
    }
}

/// Outcome of one dispatch attempt. Returned to the caller and dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchResult {
    Success { payload: String },
    Failure { error: DispatchError },
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_description(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error.to_string()),
        }
    }
}

impl From<DispatchError> for DispatchResult {
    fn from(error: DispatchError) -> Self {
        Self::Failure { error }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DispatchResult, InvocationRequest, ParamValue, Parameters};
    use crate::errors::DispatchError;

    #[test]
    fn untagged_values_decode_by_shape() {
        let decoded: Parameters =
            serde_json::from_value(json!({"limit": 5, "email": "a@b.io"})).unwrap_or_default();
        assert_eq!(decoded.get("limit"), Some(&ParamValue::Integer(5)));
        assert_eq!(decoded.get("email"), Some(&ParamValue::Text("a@b.io".to_string())));
    }

    #[test]
    fn arguments_keep_primitive_types() {
        let mut parameters = Parameters::new();
        parameters.insert("limit".to_string(), 25.into());
        parameters.insert("query".to_string(), "top deals".into());
        let request = InvocationRequest::new("get_deals", parameters, 0.8);

        let arguments = request.arguments();
        assert_eq!(arguments.get("limit"), Some(&json!(25)));
        assert_eq!(arguments.get("query"), Some(&json!("top deals")));
        assert_eq!(request.describe_parameters(), r#"{limit: 25, query: "top deals"}"#);
    }

    #[test]
    fn confidence_is_clamped_on_construction() {
        assert_eq!(InvocationRequest::new("ask_groq", Parameters::new(), 3.5).confidence, 1.0);
        assert_eq!(InvocationRequest::new("ask_groq", Parameters::new(), -1.0).confidence, 0.0);
    }

    #[test]
    fn failure_exposes_description_only() {
        let result = DispatchResult::from(DispatchError::UnrecognizedOperation {
            name: "delete_contact".to_string(),
        });
        assert!(!result.is_success());
        assert_eq!(result.payload(), None);
        assert!(result.error_description().unwrap_or_default().contains("not recognized"));
    }
}
