use fencepost::commit::DebouncePolicy;
use fencepost::config::{ApiProtocol, Config};
use fencepost::document::TabKind;
use std::time::Duration;

fn config(api_key: Option<&str>, model: &str, api_url: &str) -> Config {
    Config {
        api_key: api_key.map(str::to_string),
        model: model.to_string(),
        api_url: api_url.to_string(),
        api_version: "2023-06-01".to_string(),
        api_protocol: ApiProtocol::infer(api_url),
        max_tokens: 1024,
        language: TabKind::Javascript,
        debounce: DebouncePolicy::default(),
        output: None,
        preview_output: None,
    }
}

#[test]
fn test_config_validation_rejects_local_models_for_remote_api() {
    let config = config(
        Some("test-key"),
        "local/mock-model",
        "https://api.anthropic.com/v1/messages",
    );
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_allows_local_endpoint_without_api_key() {
    let config = config(None, "local/llama3.3", "http://localhost:8000/v1/messages");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_requires_key_for_remote_api() {
    let config = config(
        None,
        "claude-sonnet-4-5-20250929",
        "https://api.anthropic.com/v1/messages",
    );
    let err = config.validate().expect_err("remote endpoint needs a key");
    assert!(err.to_string().contains("FENCEPOST_API_KEY"));
}

#[test]
fn test_config_validation_rejects_non_http_url() {
    let config = config(Some("k"), "m", "ftp://example.com/chat");
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_checks_debounce_policy() {
    let mut config = config(None, "local/llama3.3", "http://127.0.0.1:8000/v1/messages");
    config.debounce.interval = Duration::ZERO;
    assert!(config.validate().is_err());

    config.debounce = DebouncePolicy {
        interval: Duration::from_millis(500),
        leading: true,
        trailing: false,
    };
    assert!(config.validate().is_ok());
}
