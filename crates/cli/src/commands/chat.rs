use std::sync::Arc;
use std::time::Duration;

use crmpilot_agent::{AgentRuntime, ChatCompletionClient, ClassifierAdapter, IntentResolver};
use crmpilot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use crmpilot_core::logging::init_logging;
use crmpilot_mcp::McpToolProvider;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::warn;

use crate::commands::CommandResult;
use crate::session::run_session;

const COMMAND: &str = "chat";

#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    /// Tool provider command; `provider.command` when absent.
    pub server: Option<String>,
    /// Arguments for the provider command; `provider.args` when empty.
    pub server_args: Vec<String>,
}

pub fn run(options: ChatOptions) -> CommandResult {
    let overrides = ConfigOverrides {
        provider_command: options.server,
        provider_args: (!options.server_args.is_empty()).then_some(options.server_args),
        ..ConfigOverrides::default()
    };
    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        }
    };

    runtime.block_on(run_chat(&config))
}

pub fn classifier_from_config(config: &AppConfig) -> Result<ClassifierAdapter, String> {
    match ChatCompletionClient::from_config(&config.classifier) {
        Ok(Some(client)) => Ok(ClassifierAdapter::new(
            Arc::new(client),
            Duration::from_secs(config.classifier.timeout_secs),
        )),
        Ok(None) => {
            warn!(
                event_name = "cli.chat.classifier_unconfigured",
                "no classifier credential; every free-text line goes to ask_groq"
            );
            Ok(ClassifierAdapter::unconfigured())
        }
        Err(error) => Err(format!("failed to build classifier client: {error}")),
    }
}

async fn run_chat(config: &AppConfig) -> CommandResult {
    let classifier = match classifier_from_config(config) {
        Ok(classifier) => classifier,
        Err(message) => return CommandResult::failure(COMMAND, "classifier", message, 3),
    };

    let provider = match McpToolProvider::from_config(&config.provider).await {
        Ok(provider) => Arc::new(provider),
        Err(error) => {
            return CommandResult::failure(COMMAND, "provider_connect", error.to_string(), 4)
        }
    };

    let agent = match AgentRuntime::connect(
        IntentResolver::new(classifier),
        provider.clone(),
        Duration::from_secs(config.provider.call_timeout_secs),
    )
    .await
    {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(COMMAND, "provider_catalog", error.to_string(), 4)
        }
    };

    let mut stdout = tokio::io::stdout();
    let banner = format!("\nConnected to HubSpot Server | Tools: [{}]\n", agent.catalog().listing());
    let outcome = match stdout.write_all(banner.as_bytes()).await {
        Ok(()) => run_session(&agent, BufReader::new(tokio::io::stdin()), &mut stdout).await,
        Err(error) => Err(error),
    };

    drop(agent);
    if let Ok(provider) = Arc::try_unwrap(provider) {
        if let Err(error) = provider.shutdown().await {
            warn!(event_name = "cli.chat.shutdown_failed", error = %error, "provider shutdown failed");
        }
    }

    match outcome {
        Ok(summary) => CommandResult::success(
            COMMAND,
            format!("session ended after {} turn(s), {} failed", summary.turns, summary.failures),
        ),
        Err(error) => CommandResult::failure(COMMAND, "io", error.to_string(), 5),
    }
}
