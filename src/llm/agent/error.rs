use crate::llm::core::error::LlmError;
use crate::llm::tools::{RemoteToolError, StdioToolError};

/// Errors that can occur during agent execution
///
/// Tool failures are not agent errors: they are reported back to the model
/// as error tool results.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Error from the LLM provider
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool discovery on a remote server failed
    #[error("Tool discovery failed: {0}")]
    Discovery(#[from] RemoteToolError),

    /// Starting or listing a stdio MCP server failed
    #[error("MCP server startup failed: {0}")]
    Stdio(#[from] StdioToolError),

    /// Run ended without a final answer
    #[error("Stream ended unexpectedly")]
    UnexpectedStreamEnd,

    /// Maximum iterations reached without completion
    #[error("Maximum iterations reached ({0})")]
    MaxIterationsReached(usize),
}
