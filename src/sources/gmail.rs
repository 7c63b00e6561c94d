//! Gmail REST source (read-only). Authentication is a bearer access token
//! taken from the environment or a token file; no OAuth flow is run here.

use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::MessageSource;
use crate::config::RuntimeConfig;
use crate::error::{Result, TrustError};
use crate::message::{Message, NO_SUBJECT, UNKNOWN_SENDER};

/// Gmail bodies are URL-safe base64, padded or not
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub struct GmailSource {
    client: reqwest::Client,
    api_base: String,
    user_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailMessage {
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    #[serde(alias = "access_token")]
    token: String,
}

impl GmailSource {
    pub fn new(
        api_base: String,
        user_id: String,
        access_token: String,
        timeout_ms: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TrustError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            user_id,
            access_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TrustError::source_unavailable(format!(
                "Gmail rejected the access token ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrustError::source_unavailable(format!(
                "Gmail API error {}: {}",
                status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| TrustError::source_unavailable(format!("unreadable Gmail response: {}", e)))
    }
}

#[async_trait]
impl MessageSource for GmailSource {
    async fn fetch(&self, max_results: usize) -> Result<Vec<Message>> {
        let list_url = format!(
            "{}/users/{}/messages?maxResults={}",
            self.api_base, self.user_id, max_results
        );
        let listed: ListResponse = self.get_json(&list_url).await?;
        debug!("Gmail listed {} message ids", listed.messages.len());

        let mut messages = Vec::with_capacity(listed.messages.len());
        for r in listed.messages.iter().take(max_results) {
            let url = format!(
                "{}/users/{}/messages/{}?format=full",
                self.api_base, self.user_id, r.id
            );
            let full: GmailMessage = self.get_json(&url).await?;
            messages.push(extract_message(&full));
        }
        Ok(messages)
    }

    fn name(&self) -> &str {
        "gmail"
    }
}

/// Access token from GMAIL_ACCESS_TOKEN, else from the token file
pub fn resolve_access_token(runtime: &RuntimeConfig) -> Result<String> {
    if let Some(token) = &runtime.gmail_access_token {
        return Ok(token.clone());
    }
    match &runtime.gmail_token_file {
        Some(path) => read_token_file(path),
        None => Err(TrustError::source_unavailable(
            "no Gmail access token (set GMAIL_ACCESS_TOKEN or TRUST_GMAIL_TOKEN_FILE)",
        )),
    }
}

fn read_token_file(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TrustError::source_unavailable(format!("Gmail token file {}: {}", path.display(), e))
    })?;
    let parsed: TokenFile = serde_json::from_str(&raw).map_err(|e| {
        TrustError::source_unavailable(format!("Gmail token file {}: {}", path.display(), e))
    })?;
    Ok(parsed.token)
}

/// Subject/From/plain-text body of a `format=full` message
pub fn extract_message(full: &GmailMessage) -> Message {
    let Some(payload) = &full.payload else {
        return Message::new(UNKNOWN_SENDER, None, String::new());
    };
    let subject = header_value(&payload.headers, "Subject").unwrap_or(NO_SUBJECT);
    let sender = header_value(&payload.headers, "From").unwrap_or(UNKNOWN_SENDER);
    let content = find_plain_text(payload)
        .and_then(|p| p.body.as_ref())
        .and_then(|b| b.data.as_deref())
        .map(decode_body)
        .unwrap_or_default();
    Message::new(sender, Some(subject.to_string()), content)
}

fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// First `text/plain` part, depth first; a single-part payload counts
fn find_plain_text(part: &MessagePart) -> Option<&MessagePart> {
    if part.mime_type.eq_ignore_ascii_case("text/plain") {
        return Some(part);
    }
    part.parts.iter().find_map(find_plain_text)
}

/// Decoding failures give empty content, never an error
pub fn decode_body(data: &str) -> String {
    let bytes = match URL_SAFE_LENIENT.decode(data.trim()) {
        Ok(b) => b,
        Err(e) => {
            debug!("Body is not valid base64: {}", e);
            return String::new();
        }
    };
    String::from_utf8(bytes).unwrap_or_else(|e| {
        debug!("Body is not valid UTF-8: {}", e);
        String::new()
    })
}
