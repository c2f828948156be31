// Request and response bodies of the tool server

use serde::{Deserialize, Serialize};

use crate::toolkit::ToolDescriptor;

// GET /mcp/list_tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

// POST /mcp/invoke/{tool_name} success envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeResponse {
    pub result: serde_json::Value,
    pub status: InvokeStatus,
}

impl InvokeResponse {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            result,
            status: InvokeStatus::Success,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvokeStatus {
    Success,
}

// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

// GET /
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootResponse {
    pub name: String,
    pub description: String,
    pub version: String,
    pub endpoints: Endpoints,
    pub available_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoints {
    pub list_tools: String,
    pub invoke_tool: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            list_tools: "/mcp/list_tools".to_string(),
            invoke_tool: "/mcp/invoke/{tool_name}".to_string(),
        }
    }
}
