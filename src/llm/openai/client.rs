//! Chat-completions client shared by OpenAI, DeepSeek and Kimi

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use crate::llm::core::{
    config::{ProviderConfig, ProviderKind},
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::GenerateRequest,
};
use crate::llm::http::build_http_client;
use crate::llm::stream::sse_events;

use super::mapper::{to_chat_request, ChunkMapper};
use super::types::ChatCompletionChunk;

/// Client for any OpenAI-compatible chat-completions endpoint
pub struct OpenAiClient {
    http_client: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
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
        format!("{}/chat/completions", self.config.base_url())
    }

    /// Moonshot does not accept `stream_options`; it reports usage on the last choice
    fn include_usage(&self) -> bool {
        self.config.kind != ProviderKind::Kimi
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        let body = to_chat_request(request, &self.config.model, self.include_usage());
        let url = self.endpoint_url();
        tracing::debug!(
            provider = %self.config.kind,
            url = %url,
            model = %self.config.model,
            "chat completions request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::from_response(response).await);
        }

        let mut sse = sse_events(response.bytes_stream());
        let events = stream! {
            let mut mapper = ChunkMapper::new();

            while let Some(item) = sse.next().await {
                let sse_event = match item {
                    Ok(sse_event) => sse_event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if sse_event.is_done() {
                    break;
                }

                match serde_json::from_str::<ChatCompletionChunk>(&sse_event.data) {
                    Ok(chunk) => {
                        for event in mapper.push(chunk) {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(LlmError::SerializationError(format!(
                            "Failed to parse chat completion chunk: {}. Data: {}",
                            e, sse_event.data
                        )));
                        return;
                    }
                }
            }

            for event in mapper.finish() {
                yield Ok(event);
            }
        };

        Ok(Box::pin(events))
    }

    fn name(&self) -> String {
        format!("{}/{}", self.config.kind, self.config.model)
    }
}
