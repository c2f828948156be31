//! Serving a tool registry as an MCP server on stdin/stdout

use std::io;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::{
    CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool,
    RpcError, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::server::ServerInfo;
use crate::toolkit::{InvokeError, ToolRegistry};

/// Serve on the process's stdin and stdout until stdin closes
///
/// Logs must go to stderr while this runs.
pub async fn serve_stdio(registry: &ToolRegistry, info: &ServerInfo) -> io::Result<()> {
    tracing::info!(title = %info.title, tools = ?registry.names(), "serving tools over stdio");
    serve(
        registry,
        info,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Answer one JSON-RPC message per input line
pub async fn serve<R, W>(
    registry: &ToolRegistry,
    info: &ServerInfo,
    input: R,
    mut output: W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle_line(registry, info, &line).await {
            let mut encoded = serde_json::to_vec(&response).map_err(io::Error::other)?;
            encoded.push(b'\n');
            output.write_all(&encoded).await?;
            output.flush().await?;
        }
    }

    Ok(())
}

/// Handle one message; notifications get no response
pub async fn handle_line(
    registry: &ToolRegistry,
    info: &ServerInfo,
    line: &str,
) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable message");
            return Some(JsonRpcResponse::failure(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
            ));
        }
    };

    let id = request.id?;
    let response = match dispatch(registry, info, &request.method, request.params).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    };
    Some(response)
}

async fn dispatch(
    registry: &ToolRegistry,
    info: &ServerInfo,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": info.title, "version": info.version},
        })),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let listing = ListToolsResult {
                tools: registry.descriptors().iter().map(McpTool::from).collect(),
                next_cursor: None,
            };
            encode(&listing)
        }
        "tools/call" => call_tool(registry, params).await,
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        )),
    }
}

// Tool failures are results with `isError`; bad names and arguments are protocol errors
async fn call_tool(registry: &ToolRegistry, params: Option<Value>) -> Result<Value, RpcError> {
    let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid tools/call params: {}", e)))?;

    let result = match registry.invoke(&params.name, params.arguments).await {
        Ok(value) => {
            tracing::info!(tool = %params.name, "tools/call");
            CallToolResult::text(value.to_string(), false)
        }
        Err(err @ InvokeError::Execution(_)) => {
            tracing::warn!(tool = %params.name, error = %err, "tools/call");
            CallToolResult::text(err.to_string(), true)
        }
        Err(err) => {
            tracing::warn!(tool = %params.name, error = %err, "tools/call");
            return Err(RpcError::new(INVALID_PARAMS, err.to_string()));
        }
    };
    encode(&result)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}
