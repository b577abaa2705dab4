//! crmpilot MCP Server Binary
//!
//! Serves the HubSpot CRM tools over stdio. Normally spawned by `crmpilot chat`.
//!
//! ## Usage
//!
//! ```bash
//! # Token from the environment or a .env file
//! HUBSPOT_ACCESS_TOKEN=pat-... crmpilot-mcp
//!
//! # AI tools also need a completion key
//! HUBSPOT_ACCESS_TOKEN=pat-... GROQ_API_KEY=gsk_... crmpilot-mcp
//! ```

use anyhow::Result;
use crmpilot_core::config::{AppConfig, LoadOptions};
use crmpilot_core::logging::init_logging;
use crmpilot_mcp::CrmMcpServer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config.logging);

    let server = CrmMcpServer::from_config(&config)?;
    info!(
        event_name = "mcp.server.configured",
        hubspot_base_url = %config.hubspot.base_url,
        "starting crmpilot MCP server"
    );
    server.run_stdio().await
}
