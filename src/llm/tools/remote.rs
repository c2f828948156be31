//! Executor backed by one or more tool servers over HTTP

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;

use crate::llm::core::types::ToolDeclaration;
use crate::llm::http::build_http_client;
use crate::models::{ErrorResponse, InvokeResponse, ListToolsResponse};
use crate::toolkit::{InvokeError, ToolDescriptor};

use super::executor::ToolExecutor;

/// Errors raised while discovering tools on remote servers
#[derive(Debug, Error)]
pub enum RemoteToolError {
    #[error("Failed to reach tool server {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Tool server {url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Invalid tool listing from {url}: {message}")]
    InvalidListing { url: String, message: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

#[derive(Debug)]
struct RemoteTool {
    descriptor: ToolDescriptor,
    server: String,
}

/// Routes tool calls to the server that exposes each tool
///
/// Tools are discovered once, at connect time. When two servers expose the
/// same name the first server listed wins.
#[derive(Debug)]
pub struct RemoteToolExecutor {
    http_client: Client,
    tools: Vec<RemoteTool>,
    index: HashMap<String, usize>,
}

impl RemoteToolExecutor {
    /// Discover tools on every server via `GET {url}/mcp/list_tools`
    pub async fn connect<I, S>(server_urls: I) -> Result<Self, RemoteToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let http_client =
            build_http_client().map_err(|e| RemoteToolError::Client(e.to_string()))?;
        let mut executor = Self {
            http_client,
            tools: Vec::new(),
            index: HashMap::new(),
        };

        for url in server_urls {
            let server = url.as_ref().trim_end_matches('/').to_string();
            let listing = executor.list_tools(&server).await?;
            tracing::info!(server = %server, tools = listing.tools.len(), "discovered tools");

            for descriptor in listing.tools {
                if let Some(&existing) = executor.index.get(&descriptor.name) {
                    tracing::warn!(
                        tool = %descriptor.name,
                        kept = %executor.tools[existing].server,
                        ignored = %server,
                        "duplicate tool name, keeping first server"
                    );
                    continue;
                }
                executor
                    .index
                    .insert(descriptor.name.clone(), executor.tools.len());
                executor.tools.push(RemoteTool {
                    descriptor,
                    server: server.clone(),
                });
            }
        }

        Ok(executor)
    }

    async fn list_tools(&self, server: &str) -> Result<ListToolsResponse, RemoteToolError> {
        let url = format!("{}/mcp/list_tools", server);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| RemoteToolError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| RemoteToolError::Request {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(RemoteToolError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteToolError::InvalidListing {
            url,
            message: e.to_string(),
        })
    }

    /// Descriptors of all routed tools, in discovery order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor.clone()).collect()
    }

    /// Declarations to hand to an LLM
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.declaration())
            .collect()
    }

    /// Base URL of the server a tool is routed to
    pub fn server_for(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.tools[i].server.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for RemoteToolExecutor {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let server = self.server_for(name).ok_or_else(|| InvokeError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })?;

        let url = invoke_url(server, name)?;
        let response = self
            .http_client
            .post(url.clone())
            .json(&arguments)
            .send()
            .await
            .map_err(|e| InvokeError::Execution(format!("request to {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| InvokeError::Execution(format!("reading response from {} failed: {}", url, e)))?;

        if (200..300).contains(&status) {
            let envelope: InvokeResponse = serde_json::from_str(&body).map_err(|e| {
                InvokeError::Execution(format!("invalid response from {}: {}", url, e))
            })?;
            return Ok(envelope.result);
        }

        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|error| error.detail)
            .unwrap_or(body);
        Err(error_from_status(status, name, detail, self.names()))
    }
}

/// `{server}/mcp/invoke/{name}` with the name percent-encoded
///
/// Other servers may expose names that are not path-safe.
fn invoke_url(server: &str, name: &str) -> Result<Url, InvokeError> {
    let invalid = |reason: String| {
        InvokeError::Execution(format!("invalid server URL {}: {}", server, reason))
    };

    let mut url = Url::parse(server).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["mcp", "invoke", name]);
    Ok(url)
}

/// Rebuild an [`InvokeError`] from a server's status and `detail`
///
/// The server's `detail` already carries the variant prefix, which is
/// stripped so the rebuilt error displays the same text.
fn error_from_status(
    status: u16,
    name: &str,
    detail: String,
    available: Vec<String>,
) -> InvokeError {
    match status {
        404 => InvokeError::NotFound {
            name: name.to_string(),
            available,
        },
        422 => InvokeError::InvalidInput(strip_prefix(detail, "Invalid input parameters: ")),
        500 => InvokeError::Execution(strip_prefix(detail, "Tool execution failed: ")),
        other => InvokeError::Execution(format!("HTTP {}: {}", other, detail)),
    }
}

fn strip_prefix(detail: String, prefix: &str) -> String {
    match detail.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => detail,
    }
}
