// `#[tool]` expansions name this crate as `::polymcp`, including from inside it
extern crate self as polymcp;

// Tool registration and the HTTP server exposing it
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod toolkit;

// The same registry served as an MCP stdio server
pub mod mcp;

// Tools served by `polymcp serve`
pub mod demo;

// LLM abstraction layer and agent
pub mod llm;

// Environment and CLI configuration
pub mod config;

pub use polymcp_tool_macros::tool;
pub use server::{expose_tools, ServerInfo, ToolServer};
pub use toolkit::{
    create_tool_descriptor, InvokeError, RegistryError, ToolDescriptor, ToolRegistration,
    ToolRegistry,
};

#[doc(hidden)]
pub mod __private {
    pub use schemars;
    pub use serde;
    pub use serde_json;
}
