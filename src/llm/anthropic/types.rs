//! Anthropic Messages API request and stream types

use serde::{Deserialize, Serialize};

/// Version pinned in the `anthropic-version` header
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request body for `POST /v1/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    /// Maximum number of tokens to generate (required)
    pub max_tokens: u32,
    /// Array of messages in the conversation
    pub messages: Vec<AnthropicMessage>,
    /// System prompt (top-level field)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Available tools for the model to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Always true for streaming
    pub stream: bool,
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role: "user" or "assistant"
    pub role: String,
    /// Content (can be string or array of content blocks)
    pub content: AnthropicContent,
}

/// Content can be either a simple string or an array of content blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

impl AnthropicContent {
    /// Convert to the block form so messages can be merged
    pub fn into_blocks(self) -> Vec<AnthropicContentBlock> {
        match self {
            AnthropicContent::Text(text) => vec![AnthropicContentBlock::Text { text }],
            AnthropicContent::Blocks(blocks) => blocks,
        }
    }
}

/// A content block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text { text: String },
    /// Model invoking a tool
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Application providing a tool result
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    /// Input schema (JSON Schema)
    pub input_schema: serde_json::Value,
}

/// SSE event payloads from the streaming Messages API
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicMessageData,
    },
    ContentBlockStart {
        index: usize,
        content_block: AnthropicContentBlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: AnthropicContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    /// Carries the stop reason and final output token count
    MessageDelta {
        delta: AnthropicMessageDeltaData,
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    /// Keep-alive
    Ping,
    Error {
        error: AnthropicErrorData,
    },
}

/// Message data from the message_start event
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageData {
    pub id: String,
    /// Message role (always "assistant" for responses)
    pub role: String,
    #[serde(default)]
    pub model: String,
    /// Stop reason (null during streaming)
    pub stop_reason: Option<String>,
    /// Initial usage metadata
    pub usage: AnthropicUsage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentDelta {
    TextDelta {
        text: String,
    },
    /// Fragment of tool-use arguments
    InputJsonDelta {
        partial_json: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageDeltaData {
    /// Set when the message completes
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicUsage {
    /// Not present in message_delta updates
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorData {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_request_serialization() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1024,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: AnthropicContent::Text("Hello".to_string()),
            }],
            system: Some("You are helpful".to_string()),
            tools: None,
            temperature: Some(0.7),
            top_p: None,
            top_k: None,
            stop_sequences: None,
            stream: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert!(json.get("tools").is_none());
        assert!(json.get("top_k").is_none());
    }

    #[test]
    fn test_tool_result_block_serialization() {
        let block = AnthropicContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "72°F".to_string(),
            is_error: None,
        };

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "toolu_1");
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn test_stream_event_deserialization() {
        let json = r#"{"type":"message_start","message":{"id":"msg_123","type":"message","role":"assistant","content":[],"model":"claude-sonnet-4-5","stop_reason":null,"stop_sequence":null,"usage":{"input_tokens":10,"output_tokens":1}}}"#;

        match serde_json::from_str::<AnthropicStreamEvent>(json).unwrap() {
            AnthropicStreamEvent::MessageStart { message } => {
                assert_eq!(message.id, "msg_123");
                assert_eq!(message.usage.input_tokens, 10);
            }
            other => panic!("Expected MessageStart event, got {:?}", other),
        }
    }

    #[test]
    fn test_input_json_delta() {
        let json = r#"{"type":"input_json_delta","partial_json":"{\"location\":"}"#;
        match serde_json::from_str::<AnthropicContentDelta>(json).unwrap() {
            AnthropicContentDelta::InputJsonDelta { partial_json } => {
                assert_eq!(partial_json, r#"{"location":"#);
            }
            other => panic!("Expected InputJsonDelta, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_and_error_events() {
        assert!(matches!(
            serde_json::from_str::<AnthropicStreamEvent>(r#"{"type":"ping"}"#).unwrap(),
            AnthropicStreamEvent::Ping
        ));

        let json = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match serde_json::from_str::<AnthropicStreamEvent>(json).unwrap() {
            AnthropicStreamEvent::Error { error } => {
                assert_eq!(error.error_type, "overloaded_error");
                assert_eq!(error.message, "Overloaded");
            }
            other => panic!("Expected Error event, got {:?}", other),
        }
    }
}
