//! Mapping between core types and the chat-completions wire format

use std::collections::BTreeMap;

use crate::llm::core::types::{
    ContentBlock, ContentBlockStart, ContentDelta, FinishReason, GenerateRequest, Message,
    MessageMetadata, MessageRole, PartialToolUse, StreamEvent, ToolDeclaration, UsageMetadata,
};

use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatFunction, ChatFunctionCall, ChatMessage,
    ChatTool, ChatToolCall, ChatUsage, StreamOptions,
};

/// Convert a core request to the chat-completions body
///
/// The system prompt becomes a leading `system` message and each tool result
/// becomes its own `tool` message.
pub fn to_chat_request(
    request: GenerateRequest,
    model: &str,
    include_usage: bool,
) -> ChatCompletionRequest {
    let tools = request
        .tool_declarations()
        .map(|tools| tools.iter().cloned().map(to_chat_tool).collect());

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system {
        messages.push(ChatMessage::text("system", system));
    }
    for message in request.messages {
        append_chat_messages(message, &mut messages);
    }

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        tools,
        max_tokens: request.config.max_tokens,
        temperature: request.config.temperature,
        top_p: request.config.top_p,
        stop: request.config.stop_sequences,
        stream: true,
        stream_options: include_usage.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

fn append_chat_messages(message: Message, out: &mut Vec<ChatMessage>) {
    let role = match message.role {
        MessageRole::User | MessageRole::Tool => "user",
        MessageRole::Assistant => "assistant",
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in message.content {
        match block {
            ContentBlock::Text { text: part } => text.push_str(&part),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                id,
                call_type: "function".to_string(),
                function: ChatFunctionCall {
                    name,
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => tool_results.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(content),
                tool_calls: None,
                tool_call_id: Some(tool_use_id),
            }),
        }
    }

    if !text.is_empty() || !tool_calls.is_empty() {
        out.push(ChatMessage {
            role: role.to_string(),
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        });
    }
    out.extend(tool_results);
}

fn to_chat_tool(tool: ToolDeclaration) -> ChatTool {
    ChatTool {
        tool_type: "function".to_string(),
        function: ChatFunction {
            name: tool.name,
            description: tool.description,
            parameters: tool.input_schema,
        },
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::EndTurn,
        "length" => FinishReason::MaxTokens,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        "content_filter" => FinishReason::Safety,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Turns chat-completion chunks into core stream events
///
/// Chunks carry no block structure, so blocks are opened on first content and
/// closed when the stream ends. Text is closed early when a tool call starts.
/// Tool calls are keyed by their wire `index` and stay open until the end so
/// late argument fragments still land in the right block.
#[derive(Debug, Default)]
pub struct ChunkMapper {
    started: bool,
    finished: bool,
    next_index: usize,
    open_text: Option<usize>,
    /// Wire tool-call index to block index
    tool_blocks: BTreeMap<usize, usize>,
    finish_reason: Option<FinishReason>,
    usage: UsageMetadata,
}

impl ChunkMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one chunk
    pub fn push(&mut self, chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            let error = match error.error_type {
                Some(kind) => format!("{}: {}", kind, error.message),
                None => error.message,
            };
            events.push(StreamEvent::Error { error });
            return events;
        }

        if !self.started {
            self.started = true;
            events.push(StreamEvent::MessageStart {
                message: MessageMetadata {
                    id: chunk.id.clone(),
                    role: MessageRole::Assistant,
                    usage: None,
                },
            });
        }

        if let Some(usage) = chunk.usage {
            self.record_usage(usage);
        }

        // Only the first choice is requested
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                let index = match self.open_text {
                    Some(index) => index,
                    None => {
                        let index = self.allocate_index();
                        self.open_text = Some(index);
                        events.push(StreamEvent::ContentBlockStart {
                            index,
                            block: ContentBlockStart::Text {
                                text: String::new(),
                            },
                        });
                        index
                    }
                };
                events.push(StreamEvent::ContentDelta {
                    index,
                    delta: ContentDelta::TextDelta { text },
                });
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(function) => (function.name, function.arguments),
                    None => (None, None),
                };

                let index = match self.tool_blocks.get(&call.index) {
                    Some(index) => *index,
                    None => {
                        if let Some(text_index) = self.open_text.take() {
                            events.push(StreamEvent::ContentBlockEnd { index: text_index });
                        }
                        let index = self.allocate_index();
                        self.tool_blocks.insert(call.index, index);
                        events.push(StreamEvent::ContentBlockStart {
                            index,
                            block: ContentBlockStart::ToolUse {
                                id: call
                                    .id
                                    .unwrap_or_else(|| format!("call_{}", call.index)),
                                name: name.unwrap_or_default(),
                            },
                        });
                        index
                    }
                };

                if let Some(arguments) = arguments.filter(|args| !args.is_empty()) {
                    events.push(StreamEvent::ContentDelta {
                        index,
                        delta: ContentDelta::ToolUseDelta {
                            partial: PartialToolUse {
                                id: None,
                                name: None,
                                partial_json: arguments,
                            },
                        },
                    });
                }
            }

            if let Some(usage) = choice.usage {
                self.record_usage(usage);
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(map_finish_reason(&reason));
            }
        }

        events
    }

    /// Close open blocks and emit `MessageEnd`
    ///
    /// Called on `[DONE]` or end of body. Without a finish reason the message
    /// is left unterminated so consumers see a truncated stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        let mut open: Vec<usize> = self.open_text.take().into_iter().collect();
        open.extend(self.tool_blocks.values().copied());
        open.sort_unstable();
        events.extend(
            open.into_iter()
                .map(|index| StreamEvent::ContentBlockEnd { index }),
        );
        self.tool_blocks.clear();

        if let Some(finish_reason) = self.finish_reason.take() {
            events.push(StreamEvent::MessageEnd {
                finish_reason,
                usage: self.usage,
            });
        }
        events
    }

    fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn record_usage(&mut self, usage: ChatUsage) {
        self.usage = UsageMetadata::new(usage.prompt_tokens, usage.completion_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::core::accumulator::ResponseAccumulator;
    use crate::llm::core::config::GenerationConfig;
    use serde_json::json;

    fn chunk(value: serde_json::Value) -> ChatCompletionChunk {
        serde_json::from_value(value).unwrap()
    }

    fn collect(chunks: Vec<serde_json::Value>) -> Vec<StreamEvent> {
        let mut mapper = ChunkMapper::new();
        let mut events: Vec<StreamEvent> = chunks
            .into_iter()
            .flat_map(|value| mapper.push(chunk(value)))
            .collect();
        events.extend(mapper.finish());
        events
    }

    fn accumulate(events: &[StreamEvent]) -> crate::llm::core::types::GenerateResponse {
        let mut acc = ResponseAccumulator::new();
        for event in events {
            acc.push(event).unwrap();
        }
        acc.finish().unwrap()
    }

    #[test]
    fn test_request_mapping() {
        let request = GenerateRequest {
            messages: vec![
                Message::user("What is 2+3?"),
                Message {
                    role: MessageRole::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: "add".to_string(),
                        input: json!({"a": 2, "b": 3}),
                    }],
                },
                Message::tool_result("call_1", "5"),
            ],
            tools: Some(vec![ToolDeclaration {
                name: "add".to_string(),
                description: "Add two numbers".to_string(),
                input_schema: json!({"type": "object"}),
            }]),
            config: GenerationConfig::new(300).with_stop_sequences(vec!["END".to_string()]),
            system: Some("Be brief".to_string()),
        };

        let body = to_chat_request(request, "deepseek-chat", true);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["max_tokens"], 300);
        assert_eq!(json["stop"], json!(["END"]));
        assert_eq!(json["messages"][0], json!({"role": "system", "content": "Be brief"}));
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert!(json["messages"][2].get("content").is_none());
        assert_eq!(json["messages"][2]["tool_calls"][0]["type"], "function");
        assert_eq!(
            json["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"a\":2,\"b\":3}"
        );
        assert_eq!(
            json["messages"][3],
            json!({"role": "tool", "content": "5", "tool_call_id": "call_1"})
        );
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["parameters"], json!({"type": "object"}));
    }

    #[test]
    fn test_stream_options_only_when_requested() {
        let body = to_chat_request(GenerateRequest::from_prompt("hi"), "moonshot-v1-8k", false);
        assert!(body.stream_options.is_none());
        assert!(body.tools.is_none());
    }

    #[test]
    fn test_text_stream() {
        let events = collect(vec![
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "Hel"}}]}),
            json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": "lo"}, "finish_reason": "stop"}]}),
            json!({"id": "c1", "choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 2}}),
        ]);

        assert!(matches!(&events[0], StreamEvent::MessageStart { message } if message.id == "c1"));
        assert!(matches!(
            events.last(),
            Some(StreamEvent::MessageEnd { finish_reason: FinishReason::EndTurn, .. })
        ));

        let response = accumulate(&events);
        assert_eq!(response.text(), "Hello");
        assert_eq!(response.usage, UsageMetadata::new(9, 2));
    }

    #[test]
    fn test_parallel_tool_calls() {
        let events = collect(vec![
            json!({"id": "c2", "choices": [{"index": 0, "delta": {"content": "Working."}}]}),
            json!({"id": "c2", "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_a", "type": "function", "function": {"name": "add", "arguments": ""}}
            ]}}]}),
            json!({"id": "c2", "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{\"a\": 2, "}}
            ]}}]}),
            json!({"id": "c2", "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 1, "id": "call_b", "type": "function", "function": {"name": "multiply", "arguments": "{\"a\": 4, \"b\": 5}"}}
            ]}}]}),
            json!({"id": "c2", "choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "\"b\": 3}"}}
            ]}}]}),
            json!({"id": "c2", "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        ]);

        let response = accumulate(&events);
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
        assert_eq!(response.text(), "Working.");
        assert_eq!(
            response.tool_uses(),
            vec![
                &ContentBlock::ToolUse {
                    id: "call_a".to_string(),
                    name: "add".to_string(),
                    input: json!({"a": 2, "b": 3}),
                },
                &ContentBlock::ToolUse {
                    id: "call_b".to_string(),
                    name: "multiply".to_string(),
                    input: json!({"a": 4, "b": 5}),
                },
            ]
        );
    }

    #[test]
    fn test_choice_level_usage() {
        let events = collect(vec![json!({
            "id": "k1",
            "choices": [{
                "index": 0,
                "delta": {"content": "ok"},
                "finish_reason": "length",
                "usage": {"prompt_tokens": 3, "completion_tokens": 1}
            }]
        })]);

        let response = accumulate(&events);
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
        assert_eq!(response.usage.total_tokens, 4);
    }

    #[test]
    fn test_missing_finish_reason_leaves_message_open() {
        let events = collect(vec![
            json!({"id": "c3", "choices": [{"index": 0, "delta": {"content": "cut"}}]}),
        ]);

        assert!(!events
            .iter()
            .any(|event| matches!(event, StreamEvent::MessageEnd { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::ContentBlockEnd { index: 0 })));
    }

    #[test]
    fn test_error_chunk() {
        let mut mapper = ChunkMapper::new();
        let events = mapper.push(chunk(json!({
            "error": {"message": "Rate limit reached", "type": "rate_limit_error"}
        })));

        assert_eq!(
            events,
            vec![StreamEvent::Error {
                error: "rate_limit_error: Rate limit reached".to_string()
            }]
        );
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut mapper = ChunkMapper::new();
        mapper.push(chunk(json!({"id": "c4", "choices": [{"delta": {"content": "x"}, "finish_reason": "stop"}]})));
        assert_eq!(mapper.finish().len(), 2);
        assert!(mapper.finish().is_empty());
    }
}
