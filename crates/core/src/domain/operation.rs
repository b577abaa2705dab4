use serde::{Deserialize, Serialize};

/// Operation kinds the router knows how to route, complete, and prompt for.
///
/// The tool provider advertises operations by name at connect time. Names that
/// do not map to a variant here are still dispatchable, they just have no
/// completion rule and no guided prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GetContacts,
    CreateContact,
    GetDeals,
    SearchContactByEmail,
    AnalyzeCrmData,
    AskGroq,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Self::GetContacts,
        Self::CreateContact,
        Self::GetDeals,
        Self::SearchContactByEmail,
        Self::AnalyzeCrmData,
        Self::AskGroq,
    ];

    /// Operation used when the classifier cannot produce a usable decision.
    pub const FALLBACK: Operation = Self::AskGroq;

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetContacts => "get_contacts",
            Self::CreateContact => "create_contact",
            Self::GetDeals => "get_deals",
            Self::SearchContactByEmail => "search_contact_by_email",
            Self::AnalyzeCrmData => "analyze_crm_data",
            Self::AskGroq => "ask_groq",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.name() == name)
    }

    /// Routing hint rendered into the classifier instruction.
    pub fn routing_rule(&self) -> &'static str {
        match self {
            Self::GetContacts => "SEE/LIST contacts -> get_contacts (optional limit)",
            Self::CreateContact => {
                "ADD/SAVE/CREATE a contact -> create_contact (extract firstname, lastname, email)"
            }
            Self::GetDeals => "SEE/LIST deals -> get_deals (optional limit)",
            Self::SearchContactByEmail => {
                "SEARCH/FIND/LOOK UP by email -> search_contact_by_email (extract email)"
            }
            Self::AnalyzeCrmData => "CRM INSIGHTS/ANALYSIS -> analyze_crm_data (extract query)",
            Self::AskGroq => "GENERAL/OTHER -> ask_groq (extract question)",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
