use crate::config::{is_local_url, ApiProtocol, Config};
use crate::document::TabKind;
use crate::logging::emit_debug_payload;
use crate::types::ApiMessage;
use anyhow::anyhow;
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Streaming chat client. One request per turn, no retries.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
    api_version: String,
    api_protocol: ApiProtocol,
    max_tokens: u32,
    language: TabKind,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
            api_version: config.api_version.clone(),
            api_protocol: config.api_protocol,
            max_tokens: config.max_tokens,
            language: config.language,
        })
    }

    pub async fn create_stream(&self, messages: &[ApiMessage]) -> Result<ByteStream> {
        let request_url = self.request_url();
        let payload = self.payload(messages);
        let mut request = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .json(&payload);

        emit_debug_payload(&request_url, &payload);

        match self.api_protocol {
            ApiProtocol::AnthropicMessages => {
                if let Some(api_key) = &self.api_key {
                    request = request.header("x-api-key", api_key);
                }
                if !self.api_version.trim().is_empty() {
                    request = request.header("anthropic-version", &self.api_version);
                }
            }
            ApiProtocol::OpenAiChatCompletions => {
                if let Some(api_key) = &self.api_key {
                    request = request.header("authorization", format!("Bearer {api_key}"));
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    fn payload(&self, messages: &[ApiMessage]) -> Value {
        let system_prompt = system_prompt(self.language);
        match self.api_protocol {
            ApiProtocol::AnthropicMessages => json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "stream": true,
                "system": system_prompt,
                "messages": messages,
            }),
            ApiProtocol::OpenAiChatCompletions => {
                let mut out = Vec::with_capacity(messages.len() + 1);
                out.push(json!({ "role": "system", "content": system_prompt }));
                out.extend(messages.iter().map(|message| json!(message)));
                json!({
                    "model": self.model,
                    "max_tokens": self.max_tokens,
                    "stream": true,
                    "messages": out,
                })
            }
        }
    }

    fn request_url(&self) -> String {
        match self.api_protocol {
            ApiProtocol::AnthropicMessages => self.api_url.clone(),
            ApiProtocol::OpenAiChatCompletions => {
                adapt_to_openai_chat_completions_url(&self.api_url)
            }
        }
    }
}

fn system_prompt(language: TabKind) -> String {
    format!(
        "You are a coding assistant inside a live {} playground.\n\
Answer with exactly one fenced code block containing the complete, runnable file.\n\
Keep explanations short and outside the code block.",
        language.as_str()
    )
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_url(request_url) {
        return anyhow!(
            "cannot reach local API endpoint '{}': {}. Start your local server or update FENCEPOST_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach API endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("API request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "API endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("API request to '{}' failed: {}", request_url, error)
}

fn adapt_to_openai_chat_completions_url(api_url: &str) -> String {
    let normalized = api_url.trim_end_matches('/');
    if normalized.ends_with("/chat/completions") {
        return normalized.to_string();
    }
    if let Some(prefix) = normalized.strip_suffix("/messages") {
        return format!("{prefix}/chat/completions");
    }
    if normalized.ends_with("/v1") {
        return format!("{normalized}/chat/completions");
    }
    normalized.to_string()
}
