//! HubSpot CRM v3 access for the tool server.
//!
//! `CrmStore` is the seam the server talks to; `HubSpotClient` is the only
//! production implementation. The `format_*` functions render store results
//! into the text the tools return.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use crmpilot_core::config::HubSpotConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

const CONTACT_PROPERTIES: [&str; 3] = ["firstname", "lastname", "email"];
const DEAL_PROPERTIES: [&str; 3] = ["dealname", "amount", "dealstage"];
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HubSpotError {
    #[error("hubspot is not configured: {0}")]
    NotConfigured(String),
    #[error("HubSpot request timed out")]
    Timeout,
    #[error("HubSpot connection failed: {0}")]
    Transport(String),
    #[error("HubSpot API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("HubSpot response could not be read: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for HubSpotError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// A CRM object as HubSpot returns it: an id and a flat property bag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmRecord {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl CrmRecord {
    /// Property as text. Null and blank values count as absent; numbers are
    /// rendered as written.
    pub fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewContact {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Deserialize)]
struct RecordPage {
    #[serde(default)]
    results: Vec<CrmRecord>,
}

#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn list_contacts(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError>;
    async fn list_deals(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError>;
    async fn create_contact(&self, contact: &NewContact) -> Result<CrmRecord, HubSpotError>;
    async fn search_contacts_by_email(&self, email: &str) -> Result<Vec<CrmRecord>, HubSpotError>;
}

#[derive(Clone)]
pub struct HubSpotClient {
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl std::fmt::Debug for HubSpotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSpotClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HubSpotClient {
    pub fn from_config(config: &HubSpotConfig) -> Result<Self, HubSpotError> {
        let access_token = config
            .require_access_token()
            .map_err(|error| HubSpotError::NotConfigured(error.to_string()))?
            .clone();
        Self::new(&config.base_url, access_token, Duration::from_secs(config.timeout_secs))
    }

    pub fn new(
        base_url: &str,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, HubSpotError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| HubSpotError::Transport(error.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), access_token })
    }

    fn objects_url(&self, object: &str) -> String {
        format!("{}/objects/{object}", self.base_url)
    }

    async fn list_objects(
        &self,
        object: &str,
        limit: u32,
        properties: &[&str],
    ) -> Result<Vec<CrmRecord>, HubSpotError> {
        debug!(event_name = "mcp.hubspot.list", object, limit, "listing HubSpot objects");
        let response = self
            .http
            .get(self.objects_url(object))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("limit", limit.to_string()), ("properties", properties.join(","))])
            .send()
            .await?;
        let page: RecordPage = read_json(response).await?;
        Ok(page.results)
    }
}

#[async_trait]
impl CrmStore for HubSpotClient {
    async fn list_contacts(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError> {
        self.list_objects("contacts", limit, &CONTACT_PROPERTIES).await
    }

    async fn list_deals(&self, limit: u32) -> Result<Vec<CrmRecord>, HubSpotError> {
        self.list_objects("deals", limit, &DEAL_PROPERTIES).await
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<CrmRecord, HubSpotError> {
        debug!(event_name = "mcp.hubspot.create_contact", "creating HubSpot contact");
        let body = json!({
            "properties": {
                "email": contact.email,
                "firstname": contact.firstname,
                "lastname": contact.lastname,
            }
        });
        let response = self
            .http
            .post(self.objects_url("contacts"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn search_contacts_by_email(&self, email: &str) -> Result<Vec<CrmRecord>, HubSpotError> {
        debug!(event_name = "mcp.hubspot.search_contacts", "searching HubSpot contacts by email");
        let body = json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "email", "operator": "EQ", "value": email }]
            }],
            "properties": CONTACT_PROPERTIES,
        });
        let response = self
            .http
            .post(format!("{}/search", self.objects_url("contacts")))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let page: RecordPage = read_json(response).await?;
        Ok(page.results)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, HubSpotError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HubSpotError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }
    let raw = response.text().await?;
    serde_json::from_str(&raw).map_err(|error| HubSpotError::Malformed(error.to_string()))
}

fn contact_line(record: &CrmRecord) -> String {
    let firstname = record.property("firstname").unwrap_or_default();
    let lastname = record.property("lastname").unwrap_or_default();
    let email = record.property("email").unwrap_or_else(|| "N/A".to_string());
    format!("- {firstname} {lastname} ({email})")
}

pub fn format_contacts(records: &[CrmRecord]) -> String {
    let mut out = format!("Found {} contacts:", records.len());
    for record in records {
        out.push('\n');
        out.push_str(&contact_line(record));
    }
    out
}

pub fn format_deals(records: &[CrmRecord]) -> String {
    let mut out = format!("Found {} deals:", records.len());
    for record in records {
        let name = record.property("dealname").unwrap_or_else(|| "(unnamed deal)".to_string());
        let amount = record.property("amount").unwrap_or_else(|| "N/A".to_string());
        let stage = record.property("dealstage").unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!("\n- {name} | amount: {amount} | stage: {stage}"));
    }
    out
}

pub fn format_created_contact(record: &CrmRecord) -> String {
    format!("Created contact {}: {}", record.id, contact_line(record).trim_start_matches("- "))
}

pub fn format_search_results(email: &str, records: &[CrmRecord]) -> String {
    if records.is_empty() {
        return format!("No contact found for {email}");
    }
    let mut out = format!("Found {} contact(s) for {email}:", records.len());
    for record in records {
        out.push('\n');
        out.push_str(&contact_line(record));
        out.push_str(&format!(" [id {}]", record.id));
    }
    out
}

/// Drops every non-ASCII character.
pub fn ascii_only(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}
