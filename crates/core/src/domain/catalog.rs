use std::collections::BTreeSet;

use serde::Serialize;

use super::operation::Operation;

/// Snapshot of the operation names a tool provider advertised on connect.
///
/// Built once per connection and shared read-only; a reconnect produces a new
/// snapshot instead of mutating this one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OperationCatalog {
    names: BTreeSet<String>,
}

impl OperationCatalog {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    /// Catalog containing every known operation kind.
    pub fn known() -> Self {
        Self::from_names(Operation::ALL.iter().map(Operation::name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Advertised names that map to a known operation kind.
    pub fn known_operations(&self) -> Vec<Operation> {
        self.names().filter_map(Operation::from_name).collect()
    }

    /// Advertised names the router has no kind for.
    pub fn unknown_names(&self) -> Vec<&str> {
        self.names().filter(|name| Operation::from_name(name).is_none()).collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn listing(&self) -> String {
        self.names().collect::<Vec<_>>().join(", ")
    }
}
