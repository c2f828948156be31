//! Error types for tool registration and invocation

use thiserror::Error;

/// Errors raised while building a tool registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Tool names must be non-empty
    #[error("Tool name must not be empty")]
    EmptyName,

    /// Names travel unescaped in `/mcp/invoke/{name}`
    #[error("Tool name '{0}' may only contain ASCII letters, digits, '_', '-' and '.'")]
    InvalidName(String),
}

/// Errors that fail a single tool invocation
///
/// Each variant maps onto one HTTP status when surfaced by the server, and
/// the `Display` text is used verbatim as the response `detail`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// No tool registered under the requested name
    #[error("Tool '{name}' not found. Available: [{}]", format_names(.available))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    /// Payload did not match the tool's input type
    #[error("Invalid input parameters: {0}")]
    InvalidInput(String),

    /// The tool itself failed (returned an error or panicked)
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

impl InvokeError {
    /// HTTP status code used when this error is returned by the server
    pub fn status_code(&self) -> u16 {
        match self {
            InvokeError::NotFound { .. } => 404,
            InvokeError::InvalidInput(_) => 422,
            InvokeError::Execution(_) => 500,
        }
    }
}

fn format_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(", ")
}
