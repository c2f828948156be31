//! Mapping between core types and Anthropic Messages API types

use crate::llm::core::types::{
    ContentBlock, ContentBlockStart, ContentDelta, FinishReason, GenerateRequest, Message,
    MessageMetadata, MessageRole, PartialToolUse, StreamEvent, ToolDeclaration, UsageMetadata,
};

use super::types::{
    AnthropicContent, AnthropicContentBlock, AnthropicContentBlockStart, AnthropicContentDelta,
    AnthropicMessage, AnthropicStreamEvent, AnthropicTool, MessagesRequest,
};

/// Convert a core request to the Messages API body
pub fn to_anthropic_request(request: GenerateRequest, model: &str) -> MessagesRequest {
    let tools = request
        .tool_declarations()
        .map(|tools| tools.iter().cloned().map(to_anthropic_tool).collect());

    MessagesRequest {
        model: model.to_string(),
        max_tokens: request.config.max_tokens,
        messages: merge_consecutive_roles(
            request.messages.into_iter().map(to_anthropic_message).collect(),
        ),
        system: request.system,
        tools,
        temperature: request.config.temperature,
        top_p: request.config.top_p,
        top_k: request.config.top_k,
        stop_sequences: request.config.stop_sequences,
        stream: true,
    }
}

fn to_anthropic_message(message: Message) -> AnthropicMessage {
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        // Tool results go in user messages
        MessageRole::Tool => "user",
    }
    .to_string();

    // A single text block is sent as plain string content
    if message.content.len() == 1 {
        if let ContentBlock::Text { text } = &message.content[0] {
            return AnthropicMessage {
                role,
                content: AnthropicContent::Text(text.clone()),
            };
        }
    }

    AnthropicMessage {
        role,
        content: AnthropicContent::Blocks(
            message
                .content
                .into_iter()
                .map(to_anthropic_content_block)
                .collect(),
        ),
    }
}

/// The API requires alternating roles; several tool results in a row would
/// otherwise become consecutive user messages.
fn merge_consecutive_roles(messages: Vec<AnthropicMessage>) -> Vec<AnthropicMessage> {
    let mut merged: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match merged.last_mut() {
            Some(previous) if previous.role == message.role => {
                let mut blocks = std::mem::replace(
                    &mut previous.content,
                    AnthropicContent::Blocks(Vec::new()),
                )
                .into_blocks();
                blocks.extend(message.content.into_blocks());
                previous.content = AnthropicContent::Blocks(blocks);
            }
            _ => merged.push(message),
        }
    }

    merged
}

fn to_anthropic_content_block(block: ContentBlock) -> AnthropicContentBlock {
    match block {
        ContentBlock::Text { text } => AnthropicContentBlock::Text { text },
        ContentBlock::ToolUse { id, name, input } => {
            AnthropicContentBlock::ToolUse { id, name, input }
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error: if is_error { Some(true) } else { None },
        },
    }
}

fn to_anthropic_tool(tool: ToolDeclaration) -> AnthropicTool {
    AnthropicTool {
        name: tool.name,
        description: tool.description,
        input_schema: tool.input_schema,
    }
}

/// Convert an Anthropic stream event to core events
///
/// `message_delta` with a stop reason becomes the terminal `MessageEnd`;
/// `message_stop` and pings produce nothing.
pub fn from_anthropic_event(
    event: AnthropicStreamEvent,
    accumulated_usage: &mut UsageMetadata,
) -> Vec<StreamEvent> {
    match event {
        AnthropicStreamEvent::MessageStart { message } => {
            *accumulated_usage =
                UsageMetadata::new(message.usage.input_tokens, message.usage.output_tokens);

            vec![StreamEvent::MessageStart {
                message: MessageMetadata {
                    id: message.id,
                    role: MessageRole::Assistant,
                    usage: Some(*accumulated_usage),
                },
            }]
        }
        AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => {
            let block = match content_block {
                AnthropicContentBlockStart::Text { text } => ContentBlockStart::Text { text },
                AnthropicContentBlockStart::ToolUse { id, name } => {
                    ContentBlockStart::ToolUse { id, name }
                }
            };

            vec![StreamEvent::ContentBlockStart { index, block }]
        }
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
            let delta = match delta {
                AnthropicContentDelta::TextDelta { text } => ContentDelta::TextDelta { text },
                AnthropicContentDelta::InputJsonDelta { partial_json } => {
                    ContentDelta::ToolUseDelta {
                        partial: PartialToolUse {
                            id: None,
                            name: None,
                            partial_json,
                        },
                    }
                }
            };

            vec![StreamEvent::ContentDelta { index, delta }]
        }
        AnthropicStreamEvent::ContentBlockStop { index } => {
            vec![StreamEvent::ContentBlockEnd { index }]
        }
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            if let Some(usage) = usage {
                if usage.input_tokens > 0 {
                    accumulated_usage.input_tokens = usage.input_tokens;
                }
                accumulated_usage.output_tokens = usage.output_tokens;
                accumulated_usage.total_tokens =
                    accumulated_usage.input_tokens + accumulated_usage.output_tokens;
            }

            match delta.stop_reason {
                Some(stop_reason) => vec![StreamEvent::MessageEnd {
                    finish_reason: map_stop_reason(&stop_reason),
                    usage: *accumulated_usage,
                }],
                None => vec![StreamEvent::MessageDelta {
                    usage: Some(*accumulated_usage),
                }],
            }
        }
        AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping => vec![],
        AnthropicStreamEvent::Error { error } => {
            vec![StreamEvent::Error {
                error: format!("{}: {}", error.error_type, error.message),
            }]
        }
    }
}

fn map_stop_reason(stop_reason: &str) -> FinishReason {
    match stop_reason {
        "end_turn" => FinishReason::EndTurn,
        "max_tokens" => FinishReason::MaxTokens,
        "stop_sequence" => FinishReason::StopSequence,
        "tool_use" => FinishReason::ToolUse,
        "refusal" => FinishReason::Safety,
        other => FinishReason::Other(other.to_string()),
    }
}
