//! HTTP server exposing a tool registry
//!
//! Endpoints:
//! - `GET /` - server information and available tool names
//! - `GET /mcp/list_tools` - descriptors of all tools
//! - `POST /mcp/invoke/{tool_name}` - invoke a tool with a JSON payload

use std::net::SocketAddr;
use std::sync::Arc;

use warp::Filter;

use crate::routes::configure_routes;
use crate::toolkit::ToolRegistry;

/// Metadata reported by `GET /`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            title: "MCP Tool Server".to_string(),
            description: "HTTP server exposing Rust functions as MCP tools".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// State shared by every request handler
pub struct AppState {
    pub registry: ToolRegistry,
    pub info: ServerInfo,
}

/// Build the warp filter serving a registry
///
/// # Example
///
/// ```ignore
/// let mut registry = ToolRegistry::new();
/// register_tools!(registry, add_tool);
///
/// let routes = expose_tools(registry, ServerInfo::default());
/// warp::serve(routes).run(([127, 0, 0, 1], 8000)).await;
/// ```
pub fn expose_tools(
    registry: ToolRegistry,
    info: ServerInfo,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    configure_routes(Arc::new(AppState { registry, info }))
}

/// A registry bound to server metadata, ready to run
pub struct ToolServer {
    state: Arc<AppState>,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry, info: ServerInfo) -> Self {
        Self {
            state: Arc::new(AppState { registry, info }),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the process is stopped
    pub async fn run(self, addr: impl Into<SocketAddr>) {
        let addr = addr.into();
        tracing::info!(
            %addr,
            title = %self.state.info.title,
            tools = ?self.state.registry.names(),
            "starting tool server"
        );

        warp::serve(configure_routes(self.state)).run(addr).await;
    }
}
