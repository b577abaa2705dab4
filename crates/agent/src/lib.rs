//! Agent runtime: turns free text into a tool call.
//!
//! The runtime follows a constrained loop:
//! 1. **Classification** (`classifier`) - ask the completion service which
//!    catalog operation the text names; degrade to a general question when it
//!    cannot answer.
//! 2. **Completion** (`resolver`, `extractor`) - fill primary parameters the
//!    classifier left out, from the raw text or its shape.
//! 3. **Dispatch** (`dispatcher`, `tools`) - check the operation against the
//!    provider's catalog and make a single call.
//!
//! The guided path (`guided`) skips step 1 and 2 when the user types an
//! operation name directly.

pub mod classifier;
pub mod dispatcher;
pub mod extractor;
pub mod guided;
pub mod llm;
pub mod resolver;
pub mod runtime;
pub mod tools;

pub use classifier::ClassifierAdapter;
pub use dispatcher::Dispatcher;
pub use llm::{ChatCompletionClient, LlmClient, LlmError};
pub use resolver::IntentResolver;
pub use runtime::{AgentRuntime, Turn};
pub use tools::{ToolProvider, ToolRegistry};
