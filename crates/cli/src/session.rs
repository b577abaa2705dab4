//! Interactive session loop: one line in, one tool result out.
//!
//! Every line is either an exact operation name (guided path, prompts for each
//! field) or free text (classifier path). Failures are printed and the loop
//! keeps going; only `quit`, `exit` or end of input stop it.

use crmpilot_agent::guided::{build_request, guided_fields};
use crmpilot_agent::{AgentRuntime, Turn};
use crmpilot_core::{DispatchError, DispatchResult, Operation};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

const BANNER: &str =
    "\nHubSpot MCP Intelligence System\nReady for natural language queries (type 'quit' to exit)\n\n";
const USER_PROMPT: &str = "User: ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: usize,
    pub failures: usize,
}

impl SessionSummary {
    fn record(&mut self, turn: &Turn) {
        self.turns += 1;
        if !turn.result.is_success() {
            self.failures += 1;
        }
    }
}

pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// Runs until `quit`/`exit` or end of input. Only I/O errors on the streams
/// themselves end the loop early.
pub async fn run_session<R, W>(
    runtime: &AgentRuntime,
    mut input: R,
    output: &mut W,
) -> io::Result<SessionSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = SessionSummary::default();
    output.write_all(BANNER.as_bytes()).await?;

    loop {
        let Some(line) = prompt(&mut input, output, USER_PROMPT).await? else {
            break;
        };
        let text = line.trim();
        if is_exit_command(text) {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let turn = match runtime.guided_operation(text) {
            Some(operation) => match guided_turn(runtime, operation, &mut input, output).await? {
                GuidedOutcome::Turn(turn) => turn,
                GuidedOutcome::Rejected => continue,
                GuidedOutcome::EndOfInput => break,
            },
            None => runtime.handle_text(text).await,
        };

        summary.record(&turn);
        output.write_all(render_turn(&turn).as_bytes()).await?;
        output.flush().await?;
    }

    info!(
        event_name = "cli.session.ended",
        turns = summary.turns,
        failures = summary.failures,
        "session ended"
    );
    Ok(summary)
}

enum GuidedOutcome {
    Turn(Turn),
    Rejected,
    EndOfInput,
}

async fn guided_turn<R, W>(
    runtime: &AgentRuntime,
    operation: Operation,
    input: &mut R,
    output: &mut W,
) -> io::Result<GuidedOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut answers = Vec::new();
    for field in guided_fields(operation) {
        match prompt(input, output, &format!("{}: ", field.prompt)).await? {
            Some(answer) => answers.push(answer),
            None => return Ok(GuidedOutcome::EndOfInput),
        }
    }

    match build_request(operation, &answers) {
        Ok(request) => Ok(GuidedOutcome::Turn(runtime.execute(request).await)),
        Err(error) => {
            output.write_all(format!("{}\n", error.user_message()).as_bytes()).await?;
            Ok(GuidedOutcome::Rejected)
        }
    }
}

/// Writes `label` and reads one line. `None` at end of input.
async fn prompt<R, W>(input: &mut R, output: &mut W, label: &str) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(label.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub fn render_turn(turn: &Turn) -> String {
    let request = &turn.request;
    match &turn.result {
        DispatchResult::Failure { error: error @ DispatchError::UnrecognizedOperation { .. } } => {
            format!("{}\n", error.user_message())
        }
        result => {
            let mut out = format!(
                "\n[EXECUTION] Tool: {}\n[DATA] Params: {}\n",
                request.operation_name,
                request.describe_parameters()
            );
            match result {
                DispatchResult::Success { payload } => {
                    out.push_str(&format!("\n--- RESULT ---\n{payload}\n--------------\n"));
                }
                DispatchResult::Failure { error } => {
                    out.push_str(&format!("{}\n", error.user_message()));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use crmpilot_agent::Turn;
    use crmpilot_core::{
        DispatchError, DispatchResult, InvocationRequest, ParamValue, Parameters, ProviderError,
    };
    use uuid::Uuid;

    use super::{is_exit_command, render_turn};

    fn turn(operation: &str, result: DispatchResult) -> Turn {
        let mut parameters = Parameters::new();
        parameters.insert("limit".to_string(), ParamValue::Integer(5));
        Turn {
            correlation_id: Uuid::nil(),
            request: InvocationRequest::new(operation, parameters, 0.9),
            result,
        }
    }

    #[test]
    fn exit_words_are_case_insensitive() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("  EXIT "));
        assert!(!is_exit_command("quit now"));
    }

    #[test]
    fn success_is_framed_by_result_separators() {
        let rendered = render_turn(&turn(
            "get_deals",
            DispatchResult::Success { payload: "Found 0 deals:".to_string() },
        ));

        assert_eq!(
            rendered,
            "\n[EXECUTION] Tool: get_deals\n[DATA] Params: {limit: 5}\n\n--- RESULT ---\nFound 0 deals:\n--------------\n"
        );
    }

    #[test]
    fn unrecognized_operation_prints_only_the_error() {
        let rendered = render_turn(&turn(
            "delete_contact",
            DispatchError::UnrecognizedOperation { name: "delete_contact".to_string() }.into(),
        ));

        assert_eq!(rendered, "Error: Tool 'delete_contact' is not recognized by the server.\n");
    }

    #[test]
    fn provider_failure_follows_the_execution_header() {
        let rendered = render_turn(&turn(
            "get_contacts",
            DispatchError::from(ProviderError::Remote("HubSpot API returned 401".to_string())).into(),
        ));

        assert!(rendered.starts_with("\n[EXECUTION] Tool: get_contacts\n"));
        assert!(rendered.ends_with("Execution Error: tool reported an error: HubSpot API returned 401\n"));
    }
}
