//! Upstream providers.
//!
//! Each [`ProviderKind`] has one [`ChatProvider`] implementation that turns a
//! relay request into a single upstream call. OpenAI answers are relayed as
//! received; Anthropic answers are rebuilt into the canonical response.
//! Nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::logging::SharedLogger;
use crate::providers::ProviderKind;
use crate::translate::anthropic_types::{ErrorResponse as AnthropicError, MessagesResponse};
use crate::translate::openai_types::ChatErrorResponse;
use crate::translate::relay_types::{ChatRequest, RelayResponse};
use crate::translate::request::{to_anthropic, to_openai};
use crate::translate::response::{anthropic_to_relay, truncate};

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Send one chat request upstream and return the body for the client.
    async fn send(&self, req: &ChatRequest) -> Result<RelayResponse>;
}

/// Connection details shared by both providers.
#[derive(Clone)]
pub struct Upstream {
    pub client: reqwest::Client,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub logger: SharedLogger,
}

impl Upstream {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Run a prepared request and return the body of a 2xx response.
    async fn execute(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<Bytes> {
        let response = builder.send().await.map_err(|e| {
            self.logger
                .error("proxy", format!("Request to {} failed: {}", url, e));
            RelayError::unreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            RelayError::unreachable(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body);
            self.logger.warn(
                "proxy",
                format!(
                    "Provider error status={}: {}",
                    status.as_u16(),
                    upstream_error_message(&body).unwrap_or_else(|| truncate(&body, 300).to_string())
                ),
            );
            return Err(RelayError::upstream(status.as_u16(), &body));
        }

        Ok(body)
    }
}

/// Pull a human-readable message out of either provider's error envelope.
fn upstream_error_message(body: &str) -> Option<String> {
    if let Ok(err) = serde_json::from_str::<ChatErrorResponse>(body) {
        return Some(err.error.message);
    }
    serde_json::from_str::<AnthropicError>(body)
        .ok()
        .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
}

pub struct OpenAiProvider {
    upstream: Upstream,
}

impl OpenAiProvider {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.upstream.model
    }

    async fn send(&self, req: &ChatRequest) -> Result<RelayResponse> {
        let url = self.upstream.endpoint("/chat/completions");
        let openai_req = to_openai(req, &self.upstream.model)?;

        self.upstream.logger.info(
            "proxy",
            format!(
                "POST {} model={} messages={}",
                url,
                openai_req.model,
                openai_req.messages.len()
            ),
        );

        let mut builder = self
            .upstream
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.upstream.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let body = self.upstream.execute(builder.json(&openai_req), &url).await?;
        Ok(RelayResponse::Passthrough(body))
    }
}

pub struct AnthropicProvider {
    upstream: Upstream,
    api_version: Option<&'static str>,
}

impl AnthropicProvider {
    pub fn new(upstream: Upstream) -> Self {
        Self {
            upstream,
            api_version: ProviderKind::Anthropic.preset().api_version,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.upstream.model
    }

    async fn send(&self, req: &ChatRequest) -> Result<RelayResponse> {
        let url = self.upstream.endpoint("/v1/messages");
        let anthropic_req = to_anthropic(req, &self.upstream.model);

        self.upstream.logger.info(
            "proxy",
            format!(
                "POST {} model={} messages={}",
                url,
                anthropic_req.model,
                req.turn_count()
            ),
        );

        let mut builder = self
            .upstream
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(version) = self.api_version {
            builder = builder.header("anthropic-version", version);
        }
        if let Some(ref key) = self.upstream.api_key {
            builder = builder.header("x-api-key", key);
        }

        let body = self.upstream.execute(builder.json(&anthropic_req), &url).await?;

        let resp: MessagesResponse = serde_json::from_slice(&body).map_err(|e| {
            RelayError::translation(format!(
                "Failed to parse provider response: {}. Body: {}",
                e,
                truncate(&String::from_utf8_lossy(&body), 300)
            ))
        })?;

        if let Some(ref usage) = resp.usage {
            self.upstream.logger.info(
                "proxy",
                format!(
                    "Completed: in={} out={} tokens",
                    usage.input_tokens, usage.output_tokens
                ),
            );
        }

        anthropic_to_relay(&resp).map(RelayResponse::Normalized)
    }
}

/// Build the provider selected by `config`. An unknown provider name and a
/// missing API key are each logged once; the call goes out without
/// credentials, leaving the rejection to upstream.
pub fn build_provider(
    config: &RelayConfig,
    client: reqwest::Client,
    logger: SharedLogger,
) -> Arc<dyn ChatProvider> {
    if ProviderKind::from_name(&config.provider.name).is_none() {
        logger.warn(
            "startup",
            format!(
                "Unknown provider '{}', falling back to openai",
                config.provider.name
            ),
        );
    }

    let api_key = match config.resolve_api_key() {
        Ok(key) => Some(key),
        Err(e) => {
            logger.warn("startup", e.to_string());
            None
        }
    };

    let upstream = Upstream {
        client,
        base_url: config.effective_base_url(),
        model: config.effective_model(),
        api_key,
        logger,
    };

    match config.provider_kind() {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(upstream)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(upstream)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_openai_envelope() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            upstream_error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
    }

    #[test]
    fn test_error_message_from_anthropic_envelope() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(
            upstream_error_message(body).as_deref(),
            Some("authentication_error: invalid x-api-key")
        );
    }

    #[test]
    fn test_error_message_from_plain_text() {
        assert!(upstream_error_message("Service Unavailable").is_none());
    }

    #[test]
    fn test_build_provider_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("relay.log")).unwrap();

        let mut config = RelayConfig::default();
        config.provider.name = "anthropic".to_string();
        config.provider.api_key_env = Some("LLM_RELAY_TEST_UNSET_KEY".to_string());

        let provider = build_provider(&config, reqwest::Client::new(), logger.clone());
        assert_eq!(provider.kind(), ProviderKind::Anthropic);
        assert_eq!(provider.model(), "claude-3-haiku-20240307");

        config.provider.name = "openai".to_string();
        config.provider.model = Some("gpt-4o-mini".to_string());
        let provider = build_provider(&config, reqwest::Client::new(), logger);
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_unknown_provider_warns_once() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("relay.log")).unwrap();

        let mut config = RelayConfig::default();
        config.provider.name = "Anthropic".to_string();
        config.provider.api_key_env = Some("LLM_RELAY_TEST_UNSET_KEY".to_string());

        let provider = build_provider(&config, reqwest::Client::new(), logger.clone());
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
        assert_eq!(provider.model(), "gpt-3.5-turbo");

        let unknown = logger
            .recent(100)
            .iter()
            .filter(|e| e.message.starts_with("Unknown provider"))
            .count();
        assert_eq!(unknown, 1);
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Upstream {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            logger: SharedLogger::new(dir.path().join("relay.log")).unwrap(),
        };
        assert_eq!(
            upstream.endpoint("/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
