//! crmpilot MCP (Model Context Protocol) plumbing
//!
//! Both ends of the tool-provider connection live here:
//!
//! - `CrmMcpServer`: the stdio server behind the `crmpilot-mcp` binary. It
//!   advertises the six CRM tools and talks to HubSpot and the completion
//!   service.
//! - `McpToolProvider`: the client side the router uses. It spawns the server
//!   as a child process and implements the agent's `ToolProvider`.
//!
//! ## Example Usage
//!
//! ```no_run
//! use crmpilot_core::config::{AppConfig, LoadOptions};
//! use crmpilot_mcp::CrmMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(LoadOptions::default())?;
//!     CrmMcpServer::from_config(&config)?.run_stdio().await
//! }
//! ```

mod client;
mod hubspot;
mod server;

pub use client::McpToolProvider;
pub use hubspot::{
    ascii_only, format_contacts, format_created_contact, format_deals, format_search_results,
    CrmRecord, CrmStore, HubSpotClient, HubSpotError, NewContact,
};
pub use server::{CrmMcpServer, EmailInput, LimitInput, NewContactInput, QueryInput, QuestionInput};

use thiserror::Error;

/// Errors raised while assembling the tool server
#[derive(Error, Debug)]
pub enum McpError {
    #[error("hubspot error: {0}")]
    HubSpot(#[from] HubSpotError),

    #[error("completion service unavailable: {0}")]
    CompletionUnavailable(String),
}

impl McpError {
    /// Convert to JSON-RPC error code
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::HubSpot(HubSpotError::NotConfigured(_)) => -32002,
            McpError::CompletionUnavailable(_) => -32002,
            McpError::HubSpot(_) => -32603,
        }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::{HubSpotError, McpError};

    #[test]
    fn error_codes_follow_json_rpc_ranges() {
        assert_eq!(McpError::CompletionUnavailable("bad client".into()).error_code(), -32002);
        assert_eq!(McpError::from(HubSpotError::NotConfigured("token".into())).error_code(), -32002);
        assert_eq!(McpError::from(HubSpotError::Timeout).error_code(), -32603);
    }
}
