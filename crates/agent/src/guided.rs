//! Guided manual path: when the user types an operation name, the session asks
//! for each field in turn instead of going through the classifier.

use crmpilot_core::{InputParseError, InvocationRequest, Operation, ParamValue, Parameters};

pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Whole number; a blank answer takes the default.
    Integer { default: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuidedField {
    pub name: &'static str,
    pub prompt: &'static str,
    pub kind: FieldKind,
}

const LIMIT: GuidedField =
    GuidedField { name: "limit", prompt: "Limit", kind: FieldKind::Integer { default: DEFAULT_LIMIT } };

pub fn guided_fields(operation: Operation) -> &'static [GuidedField] {
    match operation {
        Operation::GetContacts | Operation::GetDeals => &[LIMIT],
        Operation::CreateContact => &[
            GuidedField { name: "email", prompt: "Email", kind: FieldKind::Text },
            GuidedField { name: "firstname", prompt: "First Name", kind: FieldKind::Text },
            GuidedField { name: "lastname", prompt: "Last Name", kind: FieldKind::Text },
        ],
        Operation::AnalyzeCrmData => {
            &[GuidedField { name: "query", prompt: "Analysis Query", kind: FieldKind::Text }]
        }
        Operation::SearchContactByEmail => {
            &[GuidedField { name: "email", prompt: "Search Email", kind: FieldKind::Text }]
        }
        Operation::AskGroq => {
            &[GuidedField { name: "question", prompt: "Question", kind: FieldKind::Text }]
        }
    }
}

pub fn parse_field(field: &GuidedField, raw: &str) -> Result<ParamValue, InputParseError> {
    let trimmed = raw.trim();
    match field.kind {
        FieldKind::Text => Ok(ParamValue::Text(trimmed.to_string())),
        FieldKind::Integer { default } if trimmed.is_empty() => Ok(ParamValue::Integer(default)),
        FieldKind::Integer { .. } => trimmed.parse::<i64>().map(ParamValue::Integer).map_err(|_| {
            InputParseError::InvalidInteger { field: field.name, value: trimmed.to_string() }
        }),
    }
}

/// Builds a request from answers given in field order. Missing trailing
/// answers count as blank.
pub fn build_request(
    operation: Operation,
    answers: &[String],
) -> Result<InvocationRequest, InputParseError> {
    let mut parameters = Parameters::new();
    for (index, field) in guided_fields(operation).iter().enumerate() {
        let raw = answers.get(index).map(String::as_str).unwrap_or_default();
        parameters.insert(field.name.to_string(), parse_field(field, raw)?);
    }
    Ok(InvocationRequest::new(operation.name(), parameters, 1.0))
}

#[cfg(test)]
mod tests {
    use crmpilot_core::{InputParseError, Operation, ParamValue};

    use super::{build_request, guided_fields};

    fn answers(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn every_operation_has_prompts() {
        for operation in Operation::ALL {
            assert!(!guided_fields(operation).is_empty(), "{operation} has no fields");
        }
    }

    #[test]
    fn blank_limit_defaults_to_ten() {
        let request = build_request(Operation::GetDeals, &answers(&["  "]))
            .unwrap_or_else(|error| panic!("unexpected error: {error}"));
        assert_eq!(request.parameters.get("limit"), Some(&ParamValue::Integer(10)));
        assert_eq!(request.confidence, 1.0);
        assert_eq!(request.operation_name, "get_deals");
    }

    #[test]
    fn explicit_limit_is_parsed() {
        let request = build_request(Operation::GetContacts, &answers(&["25"]))
            .unwrap_or_else(|error| panic!("unexpected error: {error}"));
        assert_eq!(request.parameters.get("limit"), Some(&ParamValue::Integer(25)));
    }

    #[test]
    fn invalid_limit_is_an_input_error() {
        assert_eq!(
            build_request(Operation::GetContacts, &answers(&["ten"])),
            Err(InputParseError::InvalidInteger { field: "limit", value: "ten".to_string() })
        );
    }

    #[test]
    fn create_contact_collects_three_fields() {
        let request =
            build_request(Operation::CreateContact, &answers(&["jane@example.com", "Jane", " Doe "]))
                .unwrap_or_else(|error| panic!("unexpected error: {error}"));
        assert_eq!(request.parameters.len(), 3);
        assert_eq!(request.parameters.get("lastname"), Some(&ParamValue::Text("Doe".into())));
    }
}
