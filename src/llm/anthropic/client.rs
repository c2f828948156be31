//! Anthropic Messages API client

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use crate::llm::core::{
    config::ProviderConfig,
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::{GenerateRequest, StreamEvent, UsageMetadata},
};
use crate::llm::http::build_http_client;
use crate::llm::stream::sse_events;

use super::mapper::{from_anthropic_event, to_anthropic_request};
use super::types::{AnthropicStreamEvent, ANTHROPIC_VERSION};

/// Client for Anthropic Claude models
pub struct AnthropicClient {
    http_client: Client,
    config: ProviderConfig,
}

impl AnthropicClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        config.validate()?;

        Ok(Self {
            http_client: build_http_client()?,
            config,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url())
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        let body = to_anthropic_request(request, &self.config.model);
        let url = self.endpoint_url();
        tracing::debug!(url = %url, model = %self.config.model, "anthropic request");

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::from_response(response).await);
        }

        let mut accumulated_usage = UsageMetadata::default();
        let events = sse_events(response.bytes_stream()).flat_map(move |result| {
            let events: Vec<Result<StreamEvent, LlmError>> = match result {
                Ok(sse) => match serde_json::from_str::<AnthropicStreamEvent>(&sse.data) {
                    Ok(event) => from_anthropic_event(event, &mut accumulated_usage)
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(LlmError::SerializationError(format!(
                        "Failed to parse Anthropic event (type: {:?}): {}. Data: {}",
                        sse.event, e, sse.data
                    )))],
                },
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(events)
        });

        Ok(Box::pin(events))
    }

    fn name(&self) -> String {
        format!("{}/{}", self.config.kind, self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::core::config::ProviderKind;

    #[test]
    fn test_endpoint_url() {
        let client = AnthropicClient::new(
            ProviderConfig::new(ProviderKind::Anthropic)
                .with_api_key("key")
                .with_base_url("http://127.0.0.1:9999/"),
        )
        .unwrap();

        assert_eq!(client.endpoint_url(), "http://127.0.0.1:9999/v1/messages");
        assert_eq!(client.name(), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let result = AnthropicClient::new(ProviderConfig::new(ProviderKind::Anthropic));
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }
}
