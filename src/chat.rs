use std::env;

use anyhow::{Context, Result};
use url::Url;

pub const CHAT_API_KEY_ENV: &str = "SIGIL_CHAT_API_KEY";
pub const CHAT_ENDPOINT_ENV: &str = "SIGIL_CHAT_ENDPOINT";
pub const DEFAULT_CHAT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Deterministic fallback when no credential is configured. The chat stays
/// usable offline; it just answers as the canned site keeper.
pub const OFFLINE_REPLY: &str =
    "(no API key configured, staying offline) Hello - I'm the keeper of this corner of the web.";
pub const DEGRADED_REPLY: &str =
    "Sorry, the signal to the cloud seems lost in the fog right now.";
pub const EMPTY_REPLY: &str = "The assistant is staring at the water... (no text came back)";

const SYSTEM_INSTRUCTION: &str = "You are the resident assistant of a personal portfolio site. \
    Keep replies warm, brief and a little poetic; you are fond of imagery of forests, streams \
    and slow mornings. Never answer like a form letter.";

/// Thin request/response wrapper around a remote inference endpoint.
/// `send_message` never fails: transport and decode errors degrade to a
/// canned notice, exactly like the original site's behavior.
pub struct ChatClient {
    api_key: Option<String>,
    endpoint: Url,
}

impl ChatClient {
    pub fn new(api_key: Option<String>, endpoint: Url) -> Self {
        Self { api_key, endpoint }
    }

    pub fn from_env() -> Result<Self> {
        let endpoint = env::var(CHAT_ENDPOINT_ENV)
            .unwrap_or_else(|_| DEFAULT_CHAT_ENDPOINT.to_owned());
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("invalid chat endpoint '{endpoint}'"))?;
        let api_key = env::var(CHAT_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self { api_key, endpoint })
    }

    pub fn is_offline(&self) -> bool {
        self.api_key.is_none()
    }

    pub fn send_message(&self, message: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return OFFLINE_REPLY.to_owned();
        };

        match self.send_remote(api_key, message) {
            Ok(reply) => reply,
            Err(error) => {
                eprintln!("[sigil] chat request failed: {error:#}");
                DEGRADED_REPLY.to_owned()
            }
        }
    }

    #[cfg(feature = "remote_chat")]
    fn send_remote(&self, api_key: &str, message: &str) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start chat runtime")?;

        runtime.block_on(async {
            let mut endpoint = self.endpoint.clone();
            endpoint.query_pairs_mut().append_pair("key", api_key);

            let body = serde_json::json!({
                "system_instruction": { "parts": [ { "text": SYSTEM_INSTRUCTION } ] },
                "contents": [ { "parts": [ { "text": message } ] } ],
            });

            let response: serde_json::Value = reqwest::Client::new()
                .post(endpoint)
                .json(&body)
                .send()
                .await
                .context("failed to call chat endpoint")?
                .error_for_status()
                .context("chat endpoint returned an error status")?
                .json()
                .await
                .context("failed to decode chat response")?;

            Ok(extract_reply(&response))
        })
    }

    #[cfg(not(feature = "remote_chat"))]
    fn send_remote(&self, _api_key: &str, _message: &str) -> Result<String> {
        anyhow::bail!("built without remote chat support. Rebuild with `--features remote_chat`")
    }
}

fn extract_reply(response: &serde_json::Value) -> String {
    response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| EMPTY_REPLY.to_owned())
}
