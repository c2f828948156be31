//! Ollama chat client

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use crate::llm::core::{
    config::ProviderConfig,
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::{GenerateRequest, StreamEvent},
};
use crate::llm::http::build_http_client;
use crate::llm::stream::ndjson_lines;

use super::mapper::{to_ollama_request, ChatChunkMapper};
use super::types::ChatChunk;

/// Client for a local or remote Ollama server
///
/// No authentication is sent unless an API key is configured, in which case
/// it goes out as a bearer token (for servers behind an auth proxy).
pub struct OllamaClient {
    http_client: Client,
    config: ProviderConfig,
}

impl OllamaClient {
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        config.validate()?;

        Ok(Self {
            http_client: build_http_client()?,
            config,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url())
    }
}

#[async_trait]
impl LlmProvider for OllamaClient {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        let body = to_ollama_request(request, &self.config.model);
        let url = self.endpoint_url();
        tracing::debug!(url = %url, model = %self.config.model, "ollama request");

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(LlmError::from_response(response).await);
        }

        let mut mapper = ChatChunkMapper::new();
        let events = ndjson_lines(response.bytes_stream()).flat_map(move |result| {
            let events: Vec<Result<StreamEvent, LlmError>> = match result {
                Ok(line) => match serde_json::from_str::<ChatChunk>(&line) {
                    Ok(chunk) => mapper.push(chunk).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(LlmError::SerializationError(format!(
                        "Failed to parse Ollama chunk: {}. Data: {}",
                        e, line
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
