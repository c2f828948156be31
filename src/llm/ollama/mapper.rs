//! Mapping between core types and the Ollama chat API

use std::collections::HashMap;

use uuid::Uuid;

use crate::llm::core::types::{
    ContentBlock, ContentBlockStart, ContentDelta, FinishReason, GenerateRequest, Message,
    MessageMetadata, MessageRole, PartialToolUse, StreamEvent, ToolDeclaration, UsageMetadata,
};

use super::types::{
    ChatChunk, ChatRequest, OllamaFunction, OllamaFunctionCall, OllamaMessage, OllamaOptions,
    OllamaTool, OllamaToolCall,
};

/// Convert a core request to the `/api/chat` body
pub fn to_ollama_request(request: GenerateRequest, model: &str) -> ChatRequest {
    let tools = request
        .tool_declarations()
        .map(|tools| tools.iter().cloned().map(to_ollama_tool).collect());

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system {
        messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system,
            ..OllamaMessage::default()
        });
    }

    // Tool results reference calls by id, Ollama by function name
    let mut tool_names: HashMap<String, String> = HashMap::new();
    for message in request.messages {
        append_ollama_messages(message, &mut tool_names, &mut messages);
    }

    ChatRequest {
        model: model.to_string(),
        messages,
        tools,
        stream: true,
        options: OllamaOptions {
            num_predict: request.config.max_tokens,
            temperature: request.config.temperature,
            top_p: request.config.top_p,
            top_k: request.config.top_k,
            stop: request.config.stop_sequences,
        },
    }
}

fn append_ollama_messages(
    message: Message,
    tool_names: &mut HashMap<String, String>,
    out: &mut Vec<OllamaMessage>,
) {
    let role = match message.role {
        MessageRole::User | MessageRole::Tool => "user",
        MessageRole::Assistant => "assistant",
    };

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in message.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_names.insert(id, name.clone());
                tool_calls.push(OllamaToolCall {
                    function: OllamaFunctionCall {
                        name,
                        arguments: input,
                    },
                });
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => tool_results.push(OllamaMessage {
                role: "tool".to_string(),
                content,
                tool_calls: None,
                tool_name: tool_names.get(&tool_use_id).cloned(),
            }),
        }
    }

    if !content.is_empty() || !tool_calls.is_empty() {
        out.push(OllamaMessage {
            role: role.to_string(),
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_name: None,
        });
    }
    out.extend(tool_results);
}

fn to_ollama_tool(tool: ToolDeclaration) -> OllamaTool {
    OllamaTool {
        tool_type: "function".to_string(),
        function: OllamaFunction {
            name: tool.name,
            description: tool.description,
            parameters: tool.input_schema,
        },
    }
}

/// Turns NDJSON chat chunks into core stream events
///
/// Each tool call arrives whole, so it is emitted as a complete block with a
/// freshly generated id.
#[derive(Debug, Default)]
pub struct ChatChunkMapper {
    started: bool,
    next_index: usize,
    open_text: Option<usize>,
    saw_tool_call: bool,
}

impl ChatChunkMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one line; the `done` line closes the message
    pub fn push(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(StreamEvent::Error { error });
            return events;
        }

        if !self.started {
            self.started = true;
            events.push(StreamEvent::MessageStart {
                message: MessageMetadata {
                    id: format!("ollama-{}", Uuid::new_v4()),
                    role: MessageRole::Assistant,
                    usage: None,
                },
            });
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
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
                    delta: ContentDelta::TextDelta {
                        text: message.content,
                    },
                });
            }

            for call in message.tool_calls.unwrap_or_default() {
                self.close_text(&mut events);
                self.saw_tool_call = true;

                let index = self.allocate_index();
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    block: ContentBlockStart::ToolUse {
                        id: Uuid::new_v4().to_string(),
                        name: call.function.name,
                    },
                });
                if !call.function.arguments.is_null() {
                    events.push(StreamEvent::ContentDelta {
                        index,
                        delta: ContentDelta::ToolUseDelta {
                            partial: PartialToolUse {
                                id: None,
                                name: None,
                                partial_json: call.function.arguments.to_string(),
                            },
                        },
                    });
                }
                events.push(StreamEvent::ContentBlockEnd { index });
            }
        }

        if chunk.done {
            self.close_text(&mut events);
            events.push(StreamEvent::MessageEnd {
                finish_reason: self.finish_reason(chunk.done_reason.as_deref()),
                usage: UsageMetadata::new(
                    chunk.prompt_eval_count.unwrap_or(0),
                    chunk.eval_count.unwrap_or(0),
                ),
            });
        }

        events
    }

    /// Ollama reports `stop` even when the turn ended in tool calls
    fn finish_reason(&self, done_reason: Option<&str>) -> FinishReason {
        match done_reason {
            _ if self.saw_tool_call => FinishReason::ToolUse,
            None | Some("stop") => FinishReason::EndTurn,
            Some("length") => FinishReason::MaxTokens,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }

    fn close_text(&mut self, events: &mut Vec<StreamEvent>) {
        if let Some(index) = self.open_text.take() {
            events.push(StreamEvent::ContentBlockEnd { index });
        }
    }

    fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}
