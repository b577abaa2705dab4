use thiserror::Error;

/// Reasons the classifier could not produce a decision. Never surfaced to the
/// user; the classifier degrades to the fallback operation and logs one of these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("no classifier credential is configured")]
    MissingCredential,
    #[error("classifier request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("classifier transport failure: {0}")]
    Transport(String),
    #[error("classifier returned status {status}")]
    UnexpectedStatus { status: u16 },
    #[error("classifier response body was malformed: {0}")]
    MalformedBody(String),
    #[error("classifier reply contained no structured fragment")]
    NoStructuredFragment,
    #[error("classifier fragment was invalid: {0}")]
    InvalidFragment(String),
}

/// Failures raised by a tool provider connection or call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("tool provider connection failed: {0}")]
    Connect(String),
    #[error("tool provider transport failure: {0}")]
    Transport(String),
    #[error("tool provider call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("tool reported an error: {0}")]
    Remote(String),
    #[error("tool provider response was malformed: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("operation `{name}` is not recognized by the tool provider")]
    UnrecognizedOperation { name: String },
    #[error(transparent)]
    ProviderExecution(#[from] ProviderError),
}

impl DispatchError {
    pub fn user_message(&self) -> String {
        match self {
            Self::UnrecognizedOperation { name } => {
                format!("Error: Tool '{name}' is not recognized by the server.")
            }
            Self::ProviderExecution(error) => format!("Execution Error: {error}"),
        }
    }
}

/// Invalid literal typed into a guided prompt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputParseError {
    #[error("invalid value `{value}` for `{field}`: expected a whole number")]
    InvalidInteger { field: &'static str, value: String },
}

impl InputParseError {
    pub fn user_message(&self) -> String {
        format!("Input Error: {self}")
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{DispatchError, InputParseError, ProviderError};

    #[test]
    fn unrecognized_operation_names_the_operation() {
        let error = DispatchError::UnrecognizedOperation { name: "delete_contact".to_owned() };

        assert_eq!(
            error.to_string(),
            "operation `delete_contact` is not recognized by the tool provider"
        );
        assert_eq!(
            error.user_message(),
            "Error: Tool 'delete_contact' is not recognized by the server."
        );
    }

    #[test]
    fn provider_error_text_is_carried_through() {
        let error = DispatchError::from(ProviderError::Remote("HubSpot returned 401".to_owned()));

        assert!(error.to_string().contains("HubSpot returned 401"));
        assert!(error.user_message().starts_with("Execution Error:"));
    }

    #[test]
    fn input_errors_mention_field_and_value() {
        let error = InputParseError::InvalidInteger { field: "limit", value: "ten".to_owned() };

        assert_eq!(
            error.user_message(),
            "Input Error: invalid value `ten` for `limit`: expected a whole number"
        );
    }
}
