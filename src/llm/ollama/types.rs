//! Ollama `/api/chat` request and response types

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OllamaTool>>,
    pub stream: bool,
    pub options: OllamaOptions,
}

/// Sampling options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaOptions {
    /// Maximum tokens to generate
    pub num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
    /// Name of the tool a `tool` message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// A complete tool call; Ollama does not stream arguments or assign ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    /// Arguments as a JSON object
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OllamaFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One line of the NDJSON response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub model: String,
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    pub done_reason: Option<String>,
    /// Prompt tokens, reported on the final line
    pub prompt_eval_count: Option<u32>,
    /// Generated tokens, reported on the final line
    pub eval_count: Option<u32>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_chunk_deserialization() {
        let json = r#"{"model":"llama3.2","created_at":"2024-07-22T20:33:28.123Z","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","total_duration":4883583458,"prompt_eval_count":26,"eval_count":290}"#;

        let chunk: ChatChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.done_reason.as_deref(), Some("stop"));
        assert_eq!(chunk.prompt_eval_count, Some(26));
        assert_eq!(chunk.eval_count, Some(290));
    }

    #[test]
    fn test_tool_call_chunk_deserialization() {
        let json = r#"{"model":"llama3.2","message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"add","arguments":{"a":2,"b":3}}}]},"done":false}"#;

        let chunk: ChatChunk = serde_json::from_str(json).unwrap();
        let calls = chunk.message.unwrap().tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "add");
        assert_eq!(calls[0].function.arguments["b"], 3);
    }

    #[test]
    fn test_options_serialization() {
        let options = OllamaOptions {
            num_predict: 128,
            temperature: Some(0.1),
            ..OllamaOptions::default()
        };

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["num_predict"], 128);
        assert!(json.get("top_k").is_none());
    }
}
