//! Shared types for the crmpilot router: configuration, error kinds, and the
//! request-scoped domain values that flow from free text to a tool call.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;

pub use domain::catalog::OperationCatalog;
pub use domain::invocation::{
    ClassifierDecision, DecisionOrigin, DispatchResult, InvocationRequest, ParamValue, Parameters,
};
pub use domain::operation::Operation;
pub use errors::{ClassificationError, DispatchError, InputParseError, ProviderError};
