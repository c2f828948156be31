//! Tool execution for the agent
//!
//! The [`ToolExecutor`] trait is what the agent calls. A [`ToolRegistry`]
//! executes tools in-process; [`RemoteToolExecutor`] forwards calls to tool
//! servers over HTTP and [`StdioToolExecutor`] to MCP servers it spawns.
//! [`ToolRouter`] combines several executors.
//!
//! [`ToolRegistry`]: crate::toolkit::ToolRegistry

pub mod executor;
pub mod remote;
pub mod stdio;

// Re-export commonly used types
pub use executor::{ToolExecutor, ToolRouter};
pub use remote::{RemoteToolError, RemoteToolExecutor};
pub use stdio::{StdioServerConfig, StdioToolError, StdioToolExecutor};
