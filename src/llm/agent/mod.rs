//! Agent loop over an LLM provider and a tool executor
//!
//! The agent:
//! - Maintains conversation history across runs
//! - Calls the LLM and streams all responses
//! - Executes requested tool calls and feeds the results back
//! - Loops until the model answers without calling a tool

mod error;

pub use error::AgentError;

use crate::llm::core::{
    accumulator::ResponseAccumulator,
    config::GenerationConfig,
    provider::LlmProvider,
    types::{ContentBlock, GenerateRequest, Message, StreamEvent, ToolDeclaration},
};
use crate::llm::tools::{RemoteToolExecutor, StdioServerConfig, StdioToolExecutor, ToolExecutor};
use async_stream::stream;
use futures::stream::Stream;
use futures::StreamExt;
use pin_utils::pin_mut;
use std::pin::Pin;

/// Events emitted by the agent during execution
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Raw LLM streaming event (text deltas, tool calls, etc.)
    LlmEvent(StreamEvent),

    /// Agent is executing a tool call
    ToolExecutionStarted {
        tool_use_id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed successfully
    ToolExecutionCompleted {
        tool_use_id: String,
        name: String,
        result: serde_json::Value,
    },

    /// Tool execution failed; the error is sent back to the model
    ToolExecutionFailed {
        tool_use_id: String,
        name: String,
        error: String,
    },

    /// Agent is starting a new iteration (calling the LLM)
    IterationStarted { iteration: usize },

    /// Final response with no tool calls
    Completed { text: String },
}

/// Agent that manages conversation history and tool execution
pub struct Agent {
    provider: Box<dyn LlmProvider>,

    tool_executor: Box<dyn ToolExecutor>,

    /// Tool declarations available to the LLM
    tool_declarations: Vec<ToolDeclaration>,

    /// Conversation history (kept in memory)
    messages: Vec<Message>,

    config: GenerationConfig,

    system: Option<String>,

    /// Maximum number of LLM calls per run (default: 10)
    max_iterations: usize,
}

impl Agent {
    /// Create a new agent with default settings
    pub fn new(
        provider: Box<dyn LlmProvider>,
        tool_executor: Box<dyn ToolExecutor>,
        tool_declarations: Vec<ToolDeclaration>,
        config: GenerationConfig,
        system: Option<String>,
    ) -> Self {
        Self {
            provider,
            tool_executor,
            tool_declarations,
            messages: Vec::new(),
            config,
            system,
            max_iterations: 10,
        }
    }

    /// Create an agent using every tool exposed by the given servers
    ///
    /// # Errors
    ///
    /// Fails if any server cannot be reached or returns an invalid listing.
    pub async fn from_servers<I, S>(
        provider: Box<dyn LlmProvider>,
        server_urls: I,
        config: GenerationConfig,
    ) -> Result<Self, AgentError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let executor = RemoteToolExecutor::connect(server_urls).await?;
        let declarations = executor.declarations();
        Ok(Self::new(
            provider,
            Box::new(executor),
            declarations,
            config,
            None,
        ))
    }

    /// Create an agent using every tool of the given stdio MCP servers
    ///
    /// The servers are spawned now and killed when the agent is dropped.
    ///
    /// # Errors
    ///
    /// Fails if a server cannot be started or its handshake fails.
    pub async fn from_stdio<I>(
        provider: Box<dyn LlmProvider>,
        servers: I,
        config: GenerationConfig,
    ) -> Result<Self, AgentError>
    where
        I: IntoIterator<Item = StdioServerConfig>,
    {
        let executor = StdioToolExecutor::connect(servers).await?;
        let declarations = executor.declarations();
        Ok(Self::new(
            provider,
            Box::new(executor),
            declarations,
            config,
            None,
        ))
    }

    /// Set the maximum number of iterations (default: 10)
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Process a new user message through the agent loop
    ///
    /// The returned stream emits:
    /// - `IterationStarted` before each LLM call
    /// - `LlmEvent` for every streaming event from the LLM
    /// - `ToolExecution*` events around each tool call
    /// - `Completed` with the final text when the loop finishes
    ///
    /// An LLM failure or exceeding the iteration cap ends the stream with an error.
    pub async fn run(
        &mut self,
        user_message: impl Into<String>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send + '_>>, AgentError>
    {
        self.messages.push(Message::user(user_message));

        Ok(Box::pin(self.create_agent_stream()))
    }

    /// Run to completion and return the final answer text
    pub async fn ask(&mut self, user_message: impl Into<String>) -> Result<String, AgentError> {
        let stream = self.run(user_message).await?;
        pin_mut!(stream);

        while let Some(event) = stream.next().await {
            if let AgentEvent::Completed { text } = event? {
                return Ok(text);
            }
        }

        Err(AgentError::UnexpectedStreamEnd)
    }

    /// Get the full conversation history
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tool_declarations(&self) -> &[ToolDeclaration] {
        &self.tool_declarations
    }

    /// Clear conversation history (start fresh)
    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    fn create_agent_stream(
        &mut self,
    ) -> impl Stream<Item = Result<AgentEvent, AgentError>> + Send + '_ {
        stream! {
            let mut iteration = 0;

            loop {
                iteration += 1;

                if iteration > self.max_iterations {
                    tracing::warn!(max_iterations = self.max_iterations, "agent stopped at iteration cap");
                    yield Err(AgentError::MaxIterationsReached(self.max_iterations));
                    return;
                }

                tracing::info!(iteration, provider = %self.provider.name(), "agent iteration");
                yield Ok(AgentEvent::IterationStarted { iteration });

                let request = GenerateRequest {
                    messages: self.messages.clone(),
                    tools: Some(self.tool_declarations.clone()),
                    config: self.config.clone(),
                    system: self.system.clone(),
                };

                let mut llm_stream = match self.provider.stream_generate(request).await {
                    Ok(s) => s,
                    Err(e) => {
                        yield Err(AgentError::Llm(e));
                        return;
                    }
                };

                // Forward events while folding them into a response
                let mut accumulator = ResponseAccumulator::new();
                while let Some(event_result) = llm_stream.next().await {
                    let event = match event_result {
                        Ok(e) => e,
                        Err(e) => {
                            yield Err(AgentError::Llm(e));
                            return;
                        }
                    };

                    yield Ok(AgentEvent::LlmEvent(event.clone()));

                    if let Err(e) = accumulator.push(&event) {
                        yield Err(AgentError::Llm(e));
                        return;
                    }
                    if accumulator.is_finished() {
                        break;
                    }
                }

                let response = match accumulator.finish() {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(AgentError::Llm(e));
                        return;
                    }
                };

                let tool_uses: Vec<(String, String, serde_json::Value)> = response
                    .tool_uses()
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { id, name, input } => {
                            Some((id.clone(), name.clone(), input.clone()))
                        }
                        _ => None,
                    })
                    .collect();

                if tool_uses.is_empty() {
                    let text = response.text();
                    if !response.content.is_empty() {
                        self.messages.push(response.into_message());
                    }

                    yield Ok(AgentEvent::Completed { text });
                    return;
                }

                self.messages.push(response.into_message());

                for (id, name, input) in tool_uses {
                    tracing::info!(tool = %name, tool_use_id = %id, "executing tool");
                    yield Ok(AgentEvent::ToolExecutionStarted {
                        tool_use_id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    });

                    match self.tool_executor.execute(&name, input).await {
                        Ok(result) => {
                            self.messages.push(Message::tool_result(id.clone(), render_result(&result)));
                            yield Ok(AgentEvent::ToolExecutionCompleted {
                                tool_use_id: id,
                                name,
                                result,
                            });
                        }
                        Err(error) => {
                            tracing::warn!(tool = %name, error = %error, "tool execution failed");
                            let error = error.to_string();
                            self.messages.push(Message::tool_error(id.clone(), error.clone()));
                            yield Ok(AgentEvent::ToolExecutionFailed {
                                tool_use_id: id,
                                name,
                                error,
                            });
                        }
                    }
                }

                // Next iteration sends the tool results back to the LLM
            }
        }
    }
}

/// Text sent back to the model for a tool result
///
/// Strings are passed through unquoted; everything else as compact JSON.
fn render_result(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
