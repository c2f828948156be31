//! Provider trait for LLM implementations

use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

use super::accumulator::ResponseAccumulator;
use super::config::{ProviderConfig, ProviderKind};
use super::error::LlmError;
use super::types::{GenerateRequest, GenerateResponse, StreamEvent};
use crate::llm::anthropic::AnthropicClient;
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;

/// Boxed stream of provider events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Main interface that all LLM provider implementations must satisfy
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream generate content from the LLM
    ///
    /// This method sends a request to the LLM and returns a stream of events
    /// representing the incremental response.
    ///
    /// # Arguments
    /// * `request` - The generation request with messages, tools, and config
    ///
    /// # Returns
    /// A pinned boxed stream of `StreamEvent` results, or an error if the request fails
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError>;

    /// Generate a complete response by draining the event stream
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let mut stream = self.stream_generate(request).await?;
        let mut accumulator = ResponseAccumulator::new();

        while let Some(event) = stream.next().await {
            accumulator.push(&event?)?;
            if accumulator.is_finished() {
                break;
            }
        }

        accumulator.finish()
    }

    /// Human-readable provider/model label for logs
    fn name(&self) -> String;
}

/// Create an LLM provider from connection settings
///
/// OpenAI, Kimi and DeepSeek share the OpenAI chat-completions client and
/// differ only in base URL; Anthropic and Ollama have their own clients.
///
/// # Example
///
/// ```rust,no_run
/// use polymcp::llm::{create_provider, ProviderConfig, ProviderKind};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = create_provider(
///     ProviderConfig::new(ProviderKind::Ollama).with_model("llama3.2"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn create_provider(config: ProviderConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    config.validate()?;

    match config.kind {
        ProviderKind::OpenAi | ProviderKind::Kimi | ProviderKind::DeepSeek => {
            Ok(Box::new(OpenAiClient::new(config)?))
        }
        ProviderKind::Anthropic => Ok(Box::new(AnthropicClient::new(config)?)),
        ProviderKind::Ollama => Ok(Box::new(OllamaClient::new(config)?)),
    }
}
