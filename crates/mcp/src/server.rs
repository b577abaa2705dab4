//! MCP Server Implementation
//!
//! Serves the CRM tools over stdio. Tool failures are returned as error
//! results (`is_error = true`) with a readable message, never as protocol
//! errors, so the caller can show them and move on.

use std::sync::Arc;

use crmpilot_agent::guided::DEFAULT_LIMIT;
use crmpilot_agent::{ChatCompletionClient, LlmClient};
use crmpilot_core::config::AppConfig;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::hubspot::{
    ascii_only, format_contacts, format_created_contact, format_deals, format_search_results,
    CrmStore, HubSpotClient, NewContact,
};
use crate::{McpError, McpResult};

const MAX_LIMIT: i64 = 100;
const ANALYSIS_SAMPLE: u32 = 10;
const ANALYST_INSTRUCTION: &str =
    "You are a professional CRM analyst. Provide concise ASCII-only insights.";
const ASSISTANT_INSTRUCTION: &str =
    "You are a helpful assistant for a sales team. Answer concisely.";
const MISSING_LLM_MESSAGE: &str =
    "Error: completion service is not configured (set classifier.api_key or GROQ_API_KEY).";

/// Main MCP server for the CRM tools
#[derive(Clone)]
pub struct CrmMcpServer {
    crm: Arc<dyn CrmStore>,
    llm: Option<Arc<dyn LlmClient>>,
    tool_router: ToolRouter<Self>,
}

impl CrmMcpServer {
    pub fn new(crm: Arc<dyn CrmStore>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { crm, llm, tool_router: Self::tool_router() }
    }

    /// HubSpot client from `hubspot.*` (token required), completion client
    /// from `classifier.*` when a key is set.
    pub fn from_config(config: &AppConfig) -> McpResult<Self> {
        let hubspot = HubSpotClient::from_config(&config.hubspot)?;
        let llm = ChatCompletionClient::from_config(&config.classifier)
            .map_err(|error| McpError::CompletionUnavailable(error.to_string()))?
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
        if llm.is_none() {
            warn!(
                event_name = "mcp.server.llm_unconfigured",
                "no completion credential; analyze_crm_data and ask_groq will return errors"
            );
        }
        Ok(Self::new(Arc::new(hubspot), llm))
    }

    /// Names of the advertised tools, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect();
        names.sort();
        names
    }

    /// Run the server with stdio transport
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.starting", tools = ?self.tool_names(), "starting MCP server on stdio");

        let service = self.serve(rmcp::transport::stdio()).await?;
        let reason = service.waiting().await?;

        info!(event_name = "mcp.server.stopped", reason = ?reason, "MCP server shutdown complete");
        Ok(())
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CallToolResult> {
        let Some(llm) = &self.llm else {
            return Err(error_result(MISSING_LLM_MESSAGE));
        };
        llm.complete(system, prompt).await.map_err(|error| {
            warn!(event_name = "mcp.server.completion_failed", error = %error, "completion request failed");
            error_result(format!("Error: completion request failed: {error}"))
        })
    }
}

#[tool_handler]
impl ServerHandler for CrmMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "HubSpot CRM tools: list and search contacts, create contacts, list deals, \
                 AI analysis of CRM data, and general questions."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Tool inputs
// ============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct LimitInput {
    #[schemars(with = "Option<i64>", description = "Maximum number of records to return (1-100, default 10)")]
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<i64>,
}

/// Accepts `5` or `"5"`; a blank string means "use the default".
fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLimit {
        Integer(i64),
        Text(String),
    }

    match Option::<RawLimit>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawLimit::Integer(limit)) => Ok(Some(limit)),
        Some(RawLimit::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawLimit::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("limit must be a whole number, got `{text}`"))),
    }
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct NewContactInput {
    #[schemars(description = "Email address of the new contact")]
    #[serde(default)]
    pub email: String,
    #[schemars(description = "First name")]
    #[serde(default)]
    pub firstname: String,
    #[schemars(description = "Last name")]
    #[serde(default)]
    pub lastname: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct EmailInput {
    #[schemars(description = "Exact email address to look up")]
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct QueryInput {
    #[schemars(description = "What to analyze in the CRM data")]
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct QuestionInput {
    #[schemars(description = "Any question")]
    #[serde(default)]
    pub question: String,
}

#[tool_router]
impl CrmMcpServer {
    #[tool(description = "Fetch recent contacts from HubSpot CRM.")]
    pub async fn get_contacts(
        &self,
        Parameters(input): Parameters<LimitInput>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.crm.list_contacts(clamp_limit(input.limit)).await {
            Ok(records) => Ok(text_result(format_contacts(&records))),
            Err(error) => Ok(error_result(format!("Could not retrieve contacts: {error}"))),
        }
    }

    #[tool(description = "Create a new contact in HubSpot CRM.")]
    pub async fn create_contact(
        &self,
        Parameters(input): Parameters<NewContactInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let email = input.email.trim();
        if email.is_empty() {
            return Ok(error_result("Error: email is required to create a contact."));
        }
        let contact = NewContact {
            email: email.to_string(),
            firstname: input.firstname.trim().to_string(),
            lastname: input.lastname.trim().to_string(),
        };
        match self.crm.create_contact(&contact).await {
            Ok(created) => Ok(text_result(format_created_contact(&created))),
            Err(error) => Ok(error_result(format!("Could not create contact: {error}"))),
        }
    }

    #[tool(description = "Fetch recent deals (name, amount, stage) from HubSpot CRM.")]
    pub async fn get_deals(
        &self,
        Parameters(input): Parameters<LimitInput>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.crm.list_deals(clamp_limit(input.limit)).await {
            Ok(records) => Ok(text_result(format_deals(&records))),
            Err(error) => Ok(error_result(format!("Could not retrieve deals: {error}"))),
        }
    }

    #[tool(description = "Find a HubSpot contact by exact email address.")]
    pub async fn search_contact_by_email(
        &self,
        Parameters(input): Parameters<EmailInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let email = input.email.trim();
        if email.is_empty() {
            return Ok(error_result("Error: an email address is required to search."));
        }
        match self.crm.search_contacts_by_email(email).await {
            Ok(records) => Ok(text_result(format_search_results(email, &records))),
            Err(error) => Ok(error_result(format!("Could not search contacts: {error}"))),
        }
    }

    #[tool(description = "Analyze HubSpot CRM contacts and deals with AI for business insights.")]
    pub async fn analyze_crm_data(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<CallToolResult, ErrorData> {
        if self.llm.is_none() {
            return Ok(error_result(MISSING_LLM_MESSAGE));
        }

        let contacts = self.crm.list_contacts(ANALYSIS_SAMPLE).await.unwrap_or_else(|error| {
            warn!(event_name = "mcp.server.analysis_contacts_unavailable", error = %error, "analyzing without contacts");
            Vec::new()
        });
        let deals = self.crm.list_deals(ANALYSIS_SAMPLE).await.unwrap_or_else(|error| {
            warn!(event_name = "mcp.server.analysis_deals_unavailable", error = %error, "analyzing without deals");
            Vec::new()
        });
        let context = json!({ "contacts": contacts, "deals": deals });
        let prompt = format!("Query: {}\n\nData: {context}", input.query.trim());

        match self.complete(ANALYST_INSTRUCTION, &prompt).await {
            Ok(analysis) => Ok(text_result(format!("AI Analysis:\n{}", ascii_only(&analysis)))),
            Err(result) => Ok(result),
        }
    }

    #[tool(description = "Ask the AI assistant a general question.")]
    pub async fn ask_groq(
        &self,
        Parameters(input): Parameters<QuestionInput>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.complete(ASSISTANT_INSTRUCTION, input.question.trim()).await {
            Ok(answer) => Ok(text_result(answer)),
            Err(result) => Ok(result),
        }
    }
}

fn clamp_limit(limit: Option<i64>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as u32
}

fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use crmpilot_agent::llm::{LlmClient, LlmError};
    use rmcp::handler::server::wrapper::Parameters;
    use rmcp::model::CallToolResult;
    use serde_json::json;

    use super::{
        clamp_limit, CrmMcpServer, EmailInput, LimitInput, NewContactInput, QueryInput,
        QuestionInput,
    };
    use crate::hubspot::{CrmRecord, CrmStore, HubSpotError, NewContact};
    use crate::McpError;
    use crmpilot_core::config::AppConfig;

    #[derive(Default)]
    struct MemoryCrm {
        contacts: Vec<CrmRecord>,
        deals: Vec<CrmRecord>,
        requested_limits: Mutex<Vec<u32>>,
        fail_with: Option<HubSpotError>,
    }

    #[async_trait]
    impl CrmStore for MemoryCrm {
        async fn list_contacts(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError> {
            if let Ok(mut limits) = self.requested_limits.lock() {
                limits.push(limit);
            }
            match &self.fail_with {
                Some(error) => Err(error.clone()),
                None => Ok(self.contacts.iter().take(limit as usize).cloned().collect()),
            }
        }

        async fn list_deals(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError> {
            match &self.fail_with {
                Some(error) => Err(error.clone()),
                None => Ok(self.deals.iter().take(limit as usize).cloned().collect()),
            }
        }

        async fn create_contact(&self, contact: &NewContact) -> Result<CrmRecord, HubSpotError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            Ok(record(
                "501",
                json!({"email": contact.email, "firstname": contact.firstname, "lastname": contact.lastname}),
            ))
        }

        async fn search_contacts_by_email(
            &self,
            email: &str,
        ) -> Result<Vec<CrmRecord>, HubSpotError> {
            Ok(self
                .contacts
                .iter()
                .filter(|contact| contact.property("email").as_deref() == Some(email))
                .cloned()
                .collect())
        }
    }

    struct EchoLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok("Pipeline is healthy 🚀 overall".to_string())
        }
    }

    fn record(id: &str, properties: serde_json::Value) -> CrmRecord {
        match serde_json::from_value(json!({ "id": id, "properties": properties })) {
            Ok(record) => record,
            Err(error) => panic!("bad fixture: {error}"),
        }
    }

    fn sample_crm() -> MemoryCrm {
        MemoryCrm {
            contacts: vec![
                record("1", json!({"firstname": "Jane", "lastname": "Doe", "email": "jane@example.com"})),
                record("2", json!({"firstname": "Bob", "lastname": "Smith", "email": "bob@test.org"})),
                record("3", json!({"firstname": "Ana", "lastname": "Ruiz"})),
            ],
            deals: vec![record("9", json!({"dealname": "Renewal", "amount": "1200", "dealstage": "closedwon"}))],
            ..MemoryCrm::default()
        }
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|content| content.as_text())
            .map(|text| text.text.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn is_error(result: &CallToolResult) -> bool {
        result.is_error.unwrap_or(false)
    }

    async fn ok<F>(future: F) -> CallToolResult
    where
        F: std::future::Future<Output = Result<CallToolResult, rmcp::ErrorData>>,
    {
        match future.await {
            Ok(result) => result,
            Err(error) => panic!("tool returned protocol error: {error:?}"),
        }
    }

    #[test]
    fn advertises_the_six_crm_tools() {
        let server = CrmMcpServer::new(Arc::new(MemoryCrm::default()), None);

        assert_eq!(
            server.tool_names(),
            vec![
                "analyze_crm_data",
                "ask_groq",
                "create_contact",
                "get_contacts",
                "get_deals",
                "search_contact_by_email",
            ]
        );
    }

    #[test]
    fn assembling_from_config_requires_hubspot_token() {
        let outcome = CrmMcpServer::from_config(&AppConfig::default());

        assert!(matches!(outcome, Err(McpError::HubSpot(HubSpotError::NotConfigured(_)))));
    }

    #[test]
    fn limits_default_to_ten_and_are_clamped() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-4)), 1);
        assert_eq!(clamp_limit(Some(5000)), 100);
    }

    #[test]
    fn limit_accepts_numeric_strings() {
        let parse = |value: serde_json::Value| serde_json::from_value::<LimitInput>(value);

        assert_eq!(parse(json!({"limit": "5"})).map(|input| input.limit).ok(), Some(Some(5)));
        assert_eq!(parse(json!({"limit": " 7 "})).map(|input| input.limit).ok(), Some(Some(7)));
        assert_eq!(parse(json!({"limit": 12})).map(|input| input.limit).ok(), Some(Some(12)));
        assert_eq!(parse(json!({"limit": ""})).map(|input| input.limit).ok(), Some(None));
        assert_eq!(parse(json!({"limit": null})).map(|input| input.limit).ok(), Some(None));
        assert_eq!(parse(json!({})).map(|input| input.limit).ok(), Some(None));
        assert!(parse(json!({"limit": "ten"})).is_err());
    }

    #[tokio::test]
    async fn string_limit_reaches_the_store_as_integer() {
        let crm = Arc::new(sample_crm());
        let server = CrmMcpServer::new(crm.clone(), None);
        let input = match serde_json::from_value::<LimitInput>(json!({"limit": "1"})) {
            Ok(input) => input,
            Err(error) => panic!("string limit rejected: {error}"),
        };

        let result = ok(server.get_contacts(Parameters(input))).await;

        assert!(!is_error(&result));
        let limits = crm.requested_limits.lock().map(|limits| limits.clone()).unwrap_or_default();
        assert_eq!(limits, vec![1]);
    }

    #[tokio::test]
    async fn get_contacts_lists_with_limit() {
        let crm = Arc::new(sample_crm());
        let server = CrmMcpServer::new(crm.clone(), None);

        let result = ok(server.get_contacts(Parameters(LimitInput { limit: Some(2) }))).await;

        assert!(!is_error(&result));
        assert_eq!(
            text_of(&result),
            "Found 2 contacts:\n- Jane Doe (jane@example.com)\n- Bob Smith (bob@test.org)"
        );
        let limits = crm.requested_limits.lock().map(|limits| limits.clone()).unwrap_or_default();
        assert_eq!(limits, vec![2]);
    }

    #[tokio::test]
    async fn hubspot_failure_is_an_error_result() {
        let crm = MemoryCrm {
            fail_with: Some(HubSpotError::Status { status: 401, body: "expired token".into() }),
            ..MemoryCrm::default()
        };
        let server = CrmMcpServer::new(Arc::new(crm), None);

        let result = ok(server.get_deals(Parameters(LimitInput::default()))).await;

        assert!(is_error(&result));
        assert_eq!(text_of(&result), "Could not retrieve deals: HubSpot API returned 401: expired token");
    }

    #[tokio::test]
    async fn create_contact_requires_email() {
        let server = CrmMcpServer::new(Arc::new(sample_crm()), None);

        let missing = ok(server.create_contact(Parameters(NewContactInput::default()))).await;
        assert!(is_error(&missing));

        let created = ok(server.create_contact(Parameters(NewContactInput {
            email: " lee@acme.io ".into(),
            firstname: "Lee".into(),
            lastname: "Park".into(),
        })))
        .await;
        assert_eq!(text_of(&created), "Created contact 501: Lee Park (lee@acme.io)");
    }

    #[tokio::test]
    async fn search_reports_misses() {
        let server = CrmMcpServer::new(Arc::new(sample_crm()), None);

        let hit = ok(server.search_contact_by_email(Parameters(EmailInput { email: "bob@test.org".into() }))).await;
        assert!(text_of(&hit).contains("Bob Smith (bob@test.org) [id 2]"));

        let miss = ok(server.search_contact_by_email(Parameters(EmailInput { email: "x@y.io".into() }))).await;
        assert!(!is_error(&miss));
        assert_eq!(text_of(&miss), "No contact found for x@y.io");
    }

    #[tokio::test]
    async fn ai_tools_without_credential_name_the_setting() {
        let server = CrmMcpServer::new(Arc::new(sample_crm()), None);

        let analysis = ok(server.analyze_crm_data(Parameters(QueryInput { query: "trends".into() }))).await;
        let answer = ok(server.ask_groq(Parameters(QuestionInput { question: "hi".into() }))).await;

        for result in [analysis, answer] {
            assert!(is_error(&result));
            assert!(text_of(&result).contains("classifier.api_key"));
        }
    }

    #[tokio::test]
    async fn analysis_sends_crm_context_and_strips_non_ascii() {
        let llm = Arc::new(EchoLlm { prompts: Mutex::new(Vec::new()) });
        let server = CrmMcpServer::new(Arc::new(sample_crm()), Some(llm.clone() as Arc<dyn LlmClient>));

        let result =
            ok(server.analyze_crm_data(Parameters(QueryInput { query: "pipeline health".into() }))).await;

        assert_eq!(text_of(&result), "AI Analysis:\nPipeline is healthy  overall");
        let prompts = llm.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Query: pipeline health\n\nData: "));
        assert!(prompts[0].contains("jane@example.com"));
        assert!(prompts[0].contains("Renewal"));
    }
}
