//! LLM Abstraction Layer
//!
//! This module provides a unified streaming interface over OpenAI, Anthropic,
//! Ollama, Kimi and DeepSeek models, plus an agent that lets a model call the
//! tools exposed by a [`ToolRegistry`](crate::toolkit::ToolRegistry) or by
//! remote tool servers.

pub mod agent;
pub mod anthropic;
pub mod core;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod stream;
pub mod tools;

// Re-export commonly used types
pub use self::core::{
    accumulator::ResponseAccumulator,
    config::{GenerationConfig, ProviderConfig, ProviderKind},
    error::LlmError,
    provider::{create_provider, EventStream, LlmProvider},
    types::{
        ContentBlock, ContentDelta, FinishReason, GenerateRequest, GenerateResponse, Message,
        MessageRole, StreamEvent, ToolDeclaration, UsageMetadata,
    },
};

pub use agent::{Agent, AgentError, AgentEvent};
pub use tools::{
    RemoteToolError, RemoteToolExecutor, StdioServerConfig, StdioToolError, StdioToolExecutor,
    ToolExecutor, ToolRouter,
};
