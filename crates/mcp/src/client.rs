//! Client side of the tool-provider connection: spawns the CRM tool server as
//! a child process and speaks MCP to it over the child's stdio.

use async_trait::async_trait;
use crmpilot_agent::ToolProvider;
use crmpilot_core::config::ProviderConfig;
use crmpilot_core::domain::invocation::parameters_to_json;
use crmpilot_core::{Parameters, ProviderError};
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;
use tracing::{debug, info};

pub struct McpToolProvider {
    service: RunningService<RoleClient, ()>,
    command: String,
}

impl std::fmt::Debug for McpToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolProvider").field("command", &self.command).finish_non_exhaustive()
    }
}

impl McpToolProvider {
    pub async fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::spawn(&config.command, &config.args).await
    }

    /// Starts `command args...` and completes the MCP handshake with it.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, ProviderError> {
        let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args);
        }))
        .map_err(|error| ProviderError::Connect(format!("could not start `{command}`: {error}")))?;

        let service = ().serve(transport).await.map_err(|error| {
            ProviderError::Connect(format!("handshake with `{command}` failed: {error}"))
        })?;

        info!(
            event_name = "mcp.client.connected",
            command,
            server = ?service.peer_info().map(|info| info.server_info.name.clone()),
            "connected to tool provider"
        );
        Ok(Self { service, command: command.to_string() })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Closes the session and waits for the child to exit.
    pub async fn shutdown(self) -> Result<(), ProviderError> {
        self.service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|error| ProviderError::Transport(error.to_string()))
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn list_operations(&self) -> Result<Vec<String>, ProviderError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;
        Ok(tools.into_iter().map(|tool| tool.name.to_string()).collect())
    }

    async fn invoke(&self, operation: &str, parameters: &Parameters) -> Result<String, ProviderError> {
        debug!(event_name = "mcp.client.call_tool", operation, "calling tool");
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: operation.to_string().into(),
                arguments: Some(parameters_to_json(parameters)),
            })
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;
        tool_result_text(&result)
    }
}

/// Text content of a tool result; an error result becomes `Remote`.
pub fn tool_result_text(result: &CallToolResult) -> Result<String, ProviderError> {
    let text = result
        .content
        .iter()
        .filter_map(|content| content.as_text())
        .map(|content| content.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(ProviderError::Remote(text));
    }
    if result.content.is_empty() {
        return Err(ProviderError::MalformedResponse("tool returned no content".to_string()));
    }
    Ok(text)
}
