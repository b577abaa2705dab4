use crmpilot_agent::ToolProvider;
use crmpilot_core::config::{AppConfig, LoadOptions};
use crmpilot_core::{Operation, OperationCatalog, ProviderError};
use crmpilot_mcp::McpToolProvider;
use serde::Serialize;
use tracing::warn;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        return CommandResult::report(exit_code, &report);
    }
    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_classifier_credential(&config));
            checks.push(check_hubspot_token(&config));
            checks.push(check_provider_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["classifier_credential", "hubspot_token", "provider_catalog"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_classifier_credential(config: &AppConfig) -> DoctorCheck {
    if config.classifier.credential().is_some() {
        DoctorCheck {
            name: "classifier_credential",
            status: CheckStatus::Pass,
            details: format!("classifier will use `{}`", config.classifier.model),
        }
    } else {
        DoctorCheck {
            name: "classifier_credential",
            status: CheckStatus::Warn,
            details: "classifier.api_key is unset; free text will always route to ask_groq"
                .to_string(),
        }
    }
}

fn check_hubspot_token(config: &AppConfig) -> DoctorCheck {
    match config.hubspot.require_access_token() {
        Ok(_) => DoctorCheck {
            name: "hubspot_token",
            status: CheckStatus::Pass,
            details: "hubspot.access_token is set".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "hubspot_token",
            status: CheckStatus::Warn,
            details: format!("{error}; the bundled CRM tool server will refuse to start"),
        },
    }
}

fn check_provider_catalog(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "provider_catalog",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let provider = McpToolProvider::from_config(&config.provider)
            .await
            .map_err(|error| error.to_string())?;
        let names = provider.list_operations().await.map_err(|error| error.to_string());
        let shutdown = provider.shutdown().await;
        if let Err(error) = &shutdown {
            warn!(event_name = "cli.doctor.shutdown_failed", error = %error, "provider shutdown failed");
        }
        names.map(|names| (names, shutdown.err()))
    });

    match result {
        Ok((names, shutdown_error)) => {
            with_shutdown_note(catalog_check(&OperationCatalog::from_names(names)), shutdown_error)
        }
        Err(error) => DoctorCheck {
            name: "provider_catalog",
            status: CheckStatus::Fail,
            details: format!("`{}`: {error}", config.provider.command),
        },
    }
}

fn catalog_check(catalog: &OperationCatalog) -> DoctorCheck {
    let missing: Vec<&str> = Operation::ALL
        .iter()
        .filter(|operation| !catalog.contains(operation.name()))
        .map(|operation| operation.name())
        .collect();
    let unknown = catalog.unknown_names();

    if missing.is_empty() && unknown.is_empty() {
        return DoctorCheck {
            name: "provider_catalog",
            status: CheckStatus::Pass,
            details: format!("{} operations advertised: {}", catalog.len(), catalog.listing()),
        };
    }

    let mut notes = Vec::new();
    if !missing.is_empty() {
        notes.push(format!("missing: {}", missing.join(", ")));
    }
    if !unknown.is_empty() {
        notes.push(format!("dispatch-by-name only: {}", unknown.join(", ")));
    }
    DoctorCheck { name: "provider_catalog", status: CheckStatus::Warn, details: notes.join("; ") }
}

fn with_shutdown_note(mut check: DoctorCheck, shutdown_error: Option<ProviderError>) -> DoctorCheck {
    if let Some(error) = shutdown_error {
        check.details.push_str(&format!("; provider shutdown failed: {error}"));
    }
    check
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
