use crmpilot_core::{
    ClassifierDecision, InvocationRequest, Operation, OperationCatalog, ParamValue,
};

use crate::classifier::ClassifierAdapter;
use crate::extractor::extract_parameters;

/// How a missing primary parameter gets completed for an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionRule {
    /// The whole input is the parameter value.
    RawText { parameter: &'static str },
    /// The parameter is read off the text by the extractor, if present.
    Extracted { parameter: &'static str },
    None,
}

pub fn completion_rule(operation: Operation) -> CompletionRule {
    match operation {
        Operation::AskGroq => CompletionRule::RawText { parameter: "question" },
        Operation::AnalyzeCrmData => CompletionRule::RawText { parameter: "query" },
        Operation::SearchContactByEmail => CompletionRule::Extracted { parameter: "email" },
        Operation::GetContacts | Operation::CreateContact | Operation::GetDeals => {
            CompletionRule::None
        }
    }
}

#[derive(Clone, Default)]
pub struct IntentResolver {
    classifier: ClassifierAdapter,
}

impl IntentResolver {
    pub fn new(classifier: ClassifierAdapter) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ClassifierAdapter {
        &self.classifier
    }

    pub async fn resolve(&self, text: &str, catalog: &OperationCatalog) -> InvocationRequest {
        let decision = self.classifier.classify(text, catalog).await;
        complete_parameters(decision, text)
    }
}

/// Fills genuinely absent primary parameters. Values the classifier supplied
/// are never replaced, and gaps without a rule are left for the provider.
pub fn complete_parameters(decision: ClassifierDecision, text: &str) -> InvocationRequest {
    let mut request = decision.into_request();
    let Some(operation) = Operation::from_name(&request.operation_name) else {
        return request;
    };

    match completion_rule(operation) {
        CompletionRule::RawText { parameter } => {
            request
                .parameters
                .entry(parameter.to_string())
                .or_insert_with(|| ParamValue::Text(text.to_string()));
        }
        CompletionRule::Extracted { parameter } => {
            if !request.parameters.contains_key(parameter) {
                if let Some(value) =
                    extract_parameters(text, &request.operation_name).remove(parameter)
                {
                    request.parameters.insert(parameter.to_string(), value);
                }
            }
        }
        CompletionRule::None => {}
    }

    request
}
