//! Executor backed by MCP servers spawned as child processes
//!
//! Each server is started with piped stdio and spoken to in line-delimited
//! JSON-RPC: `initialize`, the `notifications/initialized` notification,
//! `tools/list` (following `nextCursor`) and then `tools/call` per tool use.
//! Children are killed when the executor is dropped.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::llm::core::types::ToolDeclaration;
use crate::mcp::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RpcError, INVALID_PARAMS,
    METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::toolkit::{InvokeError, ToolDescriptor};

use super::executor::ToolExecutor;

/// How long a single request may wait for its response
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised while talking to a stdio MCP server
#[derive(Debug, Error)]
pub enum StdioToolError {
    #[error("Failed to start MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP server '{0}' closed its output")]
    Closed(String),

    #[error("MCP server '{command}' did not answer {method} in time")]
    Timeout { command: String, method: String },

    #[error("Invalid message from MCP server: {0}")]
    Protocol(String),

    #[error("MCP server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Empty MCP server command")]
    EmptyCommand,
}

impl From<RpcError> for StdioToolError {
    fn from(error: RpcError) -> Self {
        StdioToolError::Rpc {
            code: error.code,
            message: error.message,
        }
    }
}

/// How to start one stdio MCP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Added to the inherited environment
    pub env: HashMap<String, String>,
}

impl StdioServerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Split a command line on whitespace: `npx @playwright/mcp@latest`
    ///
    /// No shell quoting is applied.
    pub fn parse(command_line: &str) -> Result<Self, StdioToolError> {
        let mut parts = command_line.split_whitespace();
        let command = parts.next().ok_or(StdioToolError::EmptyCommand)?;
        Ok(Self::new(command).with_args(parts))
    }
}

/// Pipes to one child, used by one request at a time
struct Connection {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    // Dropping the child kills it
    _child: Child,
}

impl Connection {
    async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), StdioToolError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|e| StdioToolError::Protocol(e.to_string()))?;
        encoded.push(b'\n');
        self.stdin.write_all(&encoded).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read until the response to `id` arrives
    ///
    /// Notifications and stale responses are skipped. Requests from the
    /// server (sampling, roots) are declined.
    async fn receive(&mut self, id: u64, command: &str) -> Result<Value, StdioToolError> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| StdioToolError::Closed(command.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(_) => {
                    tracing::debug!(server = %command, line = %line, "ignoring non-JSON output");
                    continue;
                }
            };

            let message_id = message.get("id").cloned();
            let method = message
                .get("method")
                .and_then(Value::as_str)
                .map(str::to_string);

            match (message_id, method) {
                (Some(message_id), None) if message_id == json!(id) => {
                    let response: JsonRpcResponse = serde_json::from_value(message)
                        .map_err(|e| StdioToolError::Protocol(e.to_string()))?;
                    return match response.error {
                        Some(error) => Err(error.into()),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                }
                (Some(request_id), Some(method)) => {
                    tracing::debug!(server = %command, method = %method, "declining server request");
                    let reply = JsonRpcResponse::failure(
                        request_id,
                        RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method)),
                    );
                    self.send(&reply).await?;
                }
                _ => {}
            }
        }
    }
}

struct StdioServer {
    command: String,
    connection: Mutex<Connection>,
}

impl StdioServer {
    async fn spawn(config: &StdioServerConfig) -> Result<Self, StdioToolError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StdioToolError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StdioToolError::Protocol("stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StdioToolError::Protocol("stdout was not captured".to_string()))?;

        // Server logs go to our log at debug level
        if let Some(stderr) = child.stderr.take() {
            let command = config.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %command, "{}", line);
                }
            });
        }

        Ok(Self {
            command: config.command.clone(),
            connection: Mutex::new(Connection {
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 0,
                _child: child,
            }),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, StdioToolError> {
        let mut connection = self.connection.lock().await;
        connection.next_id += 1;
        let id = connection.next_id;
        connection
            .send(&JsonRpcRequest::new(id, method, params))
            .await?;

        match tokio::time::timeout(REQUEST_TIMEOUT, connection.receive(id, &self.command)).await {
            Ok(result) => result,
            Err(_) => Err(StdioToolError::Timeout {
                command: self.command.clone(),
                method: method.to_string(),
            }),
        }
    }

    async fn initialize(&self) -> Result<(), StdioToolError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "polymcp", "version": env!("CARGO_PKG_VERSION")},
                }),
            )
            .await?;
        tracing::debug!(server = %self.command, info = %result["serverInfo"], "initialized");

        let mut connection = self.connection.lock().await;
        connection
            .send(&JsonRpcRequest::notification("notifications/initialized"))
            .await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, StdioToolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(cursor) => json!({"cursor": cursor}),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                StdioToolError::Protocol(format!("invalid tools/list result: {}", e))
            })?;

            tools.extend(page.tools.into_iter().map(|tool| tool.into_descriptor()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, InvokeError> {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await
            .map_err(invoke_error)?;

        let result: CallToolResult = serde_json::from_value(result).map_err(|e| {
            InvokeError::Execution(format!("invalid tools/call result from {}: {}", self.command, e))
        })?;

        if result.is_error {
            let text = result.joined_text();
            let detail = text
                .strip_prefix("Tool execution failed: ")
                .map(str::to_string)
                .unwrap_or(text);
            return Err(InvokeError::Execution(detail));
        }
        Ok(result.value())
    }
}

/// Invalid-params errors are the server rejecting the arguments
fn invoke_error(error: StdioToolError) -> InvokeError {
    match error {
        StdioToolError::Rpc { code, message } if code == INVALID_PARAMS => {
            let detail = message
                .strip_prefix("Invalid input parameters: ")
                .map(str::to_string)
                .unwrap_or(message);
            InvokeError::InvalidInput(detail)
        }
        other => InvokeError::Execution(other.to_string()),
    }
}

struct StdioTool {
    descriptor: ToolDescriptor,
    server: usize,
}

/// Routes tool calls to the stdio MCP server that exposes each tool
///
/// When two servers expose the same name the first server listed wins.
pub struct StdioToolExecutor {
    servers: Vec<StdioServer>,
    tools: Vec<StdioTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for StdioToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioToolExecutor")
            .field(
                "servers",
                &self.servers.iter().map(|server| &server.command).collect::<Vec<_>>(),
            )
            .field("tools", &self.names())
            .finish()
    }
}

impl StdioToolExecutor {
    /// Spawn every server, run the handshake and list its tools
    pub async fn connect<I>(configs: I) -> Result<Self, StdioToolError>
    where
        I: IntoIterator<Item = StdioServerConfig>,
    {
        let mut executor = Self {
            servers: Vec::new(),
            tools: Vec::new(),
            index: HashMap::new(),
        };

        for config in configs {
            let server = StdioServer::spawn(&config).await?;
            server.initialize().await?;
            let descriptors = server.list_tools().await?;
            tracing::info!(server = %config.command, tools = descriptors.len(), "discovered tools");

            let position = executor.servers.len();
            for descriptor in descriptors {
                if let Some(&existing) = executor.index.get(&descriptor.name) {
                    tracing::warn!(
                        tool = %descriptor.name,
                        kept = %executor.servers[executor.tools[existing].server].command,
                        ignored = %config.command,
                        "duplicate tool name, keeping first server"
                    );
                    continue;
                }
                executor
                    .index
                    .insert(descriptor.name.clone(), executor.tools.len());
                executor.tools.push(StdioTool {
                    descriptor,
                    server: position,
                });
            }
            executor.servers.push(server);
        }

        Ok(executor)
    }

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

    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for StdioToolExecutor {
    async fn execute(&self, name: &str, arguments: Value) -> Result<Value, InvokeError> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| InvokeError::NotFound {
                name: name.to_string(),
                available: self.names(),
            })?;

        self.servers[tool.server].call_tool(name, arguments).await
    }
}
