use std::sync::LazyLock;

use crmpilot_core::{Operation, ParamValue, Parameters};
use regex::Regex;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotShape {
    Email,
}

struct Slot {
    name: &'static str,
    shape: SlotShape,
}

/// Slots that can be read off the text shape for a given operation.
fn slots_for(operation: Operation) -> &'static [Slot] {
    match operation {
        Operation::SearchContactByEmail => &[Slot { name: "email", shape: SlotShape::Email }],
        Operation::GetContacts
        | Operation::CreateContact
        | Operation::GetDeals
        | Operation::AnalyzeCrmData
        | Operation::AskGroq => &[],
    }
}

/// Best-effort slot extraction for `operation_name` from raw text.
///
/// Only parameters whose value is unambiguous from its shape are returned; a
/// slot with no match is simply absent. Unknown operation names yield nothing.
pub fn extract_parameters(text: &str, operation_name: &str) -> Parameters {
    let mut parameters = Parameters::new();
    let Some(operation) = Operation::from_name(operation_name) else {
        return parameters;
    };

    for slot in slots_for(operation) {
        let value = match slot.shape {
            SlotShape::Email => find_email(text),
        };
        if let Some(value) = value {
            parameters.insert(slot.name.to_string(), ParamValue::Text(value));
        }
    }

    parameters
}

/// First email-shaped token in `text`.
pub fn find_email(text: &str) -> Option<String> {
    let pattern = EMAIL_PATTERN.as_ref()?;
    pattern.find(text).map(|found| found.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use crmpilot_core::ParamValue;

    use super::{extract_parameters, find_email};

    #[test]
    fn extracts_email_for_search() {
        let parameters = extract_parameters("find jane@example.com please", "search_contact_by_email");
        assert_eq!(
            parameters.get("email"),
            Some(&ParamValue::Text("jane@example.com".to_string()))
        );
    }

    #[test]
    fn first_address_wins_when_several_are_present() {
        assert_eq!(
            find_email("cc ops@corp.io then bob.smith+crm@test.org").as_deref(),
            Some("ops@corp.io")
        );
    }

    #[test]
    fn trailing_punctuation_is_not_part_of_the_address() {
        assert_eq!(find_email("is it bob@test.org?").as_deref(), Some("bob@test.org"));
        assert_eq!(find_email("(alice@mail.example.co.uk).").as_deref(), Some("alice@mail.example.co.uk"));
    }

    #[test]
    fn malformed_addresses_are_not_guessed() {
        for text in ["bob@test", "@test.org", "bob at test dot org", "bob@test.o", ""] {
            assert_eq!(find_email(text), None, "unexpected match in {text:?}");
        }
    }

    #[test]
    fn operations_without_slots_yield_nothing() {
        assert!(extract_parameters("add jane@example.com", "create_contact").is_empty());
        assert!(extract_parameters("jane@example.com", "delete_contact").is_empty());
    }

    #[test]
    fn missing_match_is_an_empty_mapping() {
        assert!(extract_parameters("look up bob", "search_contact_by_email").is_empty());
    }
}
