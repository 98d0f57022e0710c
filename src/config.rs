use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::commit::DebouncePolicy;
use crate::document::TabKind;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const MIN_MAX_TOKENS: u32 = 128;
const MAX_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiProtocol {
    AnthropicMessages,
    OpenAiChatCompletions,
}

impl ApiProtocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "anthropic_messages" | "messages" | "v1/messages" => {
                Some(ApiProtocol::AnthropicMessages)
            }
            "openai" | "chat" | "chat_completions" | "openai_chat_completions" => {
                Some(ApiProtocol::OpenAiChatCompletions)
            }
            _ => None,
        }
    }

    pub fn infer(api_url: &str) -> Self {
        let normalized = api_url.trim().to_ascii_lowercase();
        if normalized.contains("/chat/completions") || normalized.ends_with("/v1") {
            ApiProtocol::OpenAiChatCompletions
        } else {
            ApiProtocol::AnthropicMessages
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub api_version: String,
    pub api_protocol: ApiProtocol,
    pub max_tokens: u32,
    pub language: TabKind,
    pub debounce: DebouncePolicy,
    pub output: Option<PathBuf>,
    /// Receives the live document on every valid change, undebounced.
    pub preview_output: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `FENCEPOST_*` variables provided by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = var("FENCEPOST_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_protocol = match var("FENCEPOST_API_PROTOCOL") {
            Some(value) => ApiProtocol::parse(&value)
                .ok_or_else(|| anyhow!("Invalid FENCEPOST_API_PROTOCOL '{value}'"))?,
            None => ApiProtocol::infer(&api_url),
        };
        let max_tokens = match var("FENCEPOST_MAX_TOKENS") {
            Some(value) => value
                .parse::<u32>()
                .with_context(|| format!("Invalid FENCEPOST_MAX_TOKENS '{value}'"))?
                .clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS),
            None if is_local_url(&api_url) => 1024,
            None => 4096,
        };
        let language = match var("FENCEPOST_LANGUAGE") {
            Some(value) => TabKind::parse(&value)
                .ok_or_else(|| anyhow!("Invalid FENCEPOST_LANGUAGE '{value}': expected javascript, html or css"))?,
            None => TabKind::default(),
        };

        let defaults = DebouncePolicy::default();
        let interval = match var("FENCEPOST_TICK_MS") {
            Some(value) => Duration::from_millis(
                value
                    .parse::<u64>()
                    .with_context(|| format!("Invalid FENCEPOST_TICK_MS '{value}'"))?,
            ),
            None => defaults.interval,
        };
        let debounce = DebouncePolicy {
            interval,
            leading: bool_var(&var, "FENCEPOST_LEADING")?.unwrap_or(defaults.leading),
            trailing: bool_var(&var, "FENCEPOST_TRAILING")?.unwrap_or(defaults.trailing),
        };

        Ok(Self {
            api_key: var("FENCEPOST_API_KEY"),
            model: var("FENCEPOST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url,
            api_version: var("FENCEPOST_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_protocol,
            max_tokens,
            language,
            debounce,
            output: var("FENCEPOST_OUTPUT").map(PathBuf::from),
            preview_output: var("FENCEPOST_PREVIEW_OUTPUT").map(PathBuf::from),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid FENCEPOST_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        let local_endpoint = is_local_url(&self.api_url);
        if !local_endpoint && self.api_key.is_none() {
            bail!(
                "FENCEPOST_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.model.trim().is_empty() {
            bail!("FENCEPOST_MODEL must not be empty");
        }

        if !local_endpoint && self.model.starts_with("local/") {
            bail!("Local models are only allowed for localhost endpoints");
        }

        self.debounce.validate()
    }
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loopback, unspecified and `localhost` hosts; these never need an API key.
pub(crate) fn is_local_url(url: &str) -> bool {
    let Ok(url) = Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(addr) => addr.is_loopback() || addr.is_unspecified(),
        Err(_) => host.eq_ignore_ascii_case("localhost"),
    }
}

fn bool_var(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    var(key)
        .map(|value| {
            parse_bool(&value).ok_or_else(|| anyhow!("Invalid {key} '{value}': expected a boolean"))
        })
        .transpose()
}
