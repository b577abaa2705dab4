pub mod commands;
pub mod session;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::chat::ChatOptions;

#[derive(Debug, Parser)]
#[command(
    name = "crmpilot",
    about = "crmpilot operator CLI",
    long_about = "Talk to your HubSpot CRM in plain language, inspect configuration, and check readiness.",
    after_help = "Examples:\n  crmpilot chat\n  crmpilot chat --server ./target/release/crmpilot-mcp\n  crmpilot doctor --json\n  crmpilot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Connect to the tool provider and start the interactive session")]
    Chat {
        #[arg(long, help = "Tool provider command (defaults to provider.command)")]
        server: Option<String>,
        #[arg(last = true, help = "Arguments passed to the tool provider command")]
        server_args: Vec<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential readiness, and the provider's tool catalog")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { server, server_args } => {
            commands::chat::run(ChatOptions { server, server_args })
        }
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
