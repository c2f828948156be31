//! Folding a provider event stream into a complete response

use super::error::LlmError;
use super::types::{
    ContentBlock, ContentBlockStart, ContentDelta, FinishReason, GenerateResponse, StreamEvent,
    UsageMetadata,
};

enum BlockKind {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
        input: Option<serde_json::Value>,
    },
}

struct Block {
    index: usize,
    kind: BlockKind,
}

/// Collects streamed content blocks, finish reason and usage
///
/// Blocks are kept in the order they were started. Tool-use input arrives as
/// JSON fragments and is parsed when its block ends; an empty input is `{}`.
#[derive(Default)]
pub struct ResponseAccumulator {
    id: String,
    blocks: Vec<Block>,
    finish_reason: Option<FinishReason>,
    usage: UsageMetadata,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stream event
    pub fn push(&mut self, event: &StreamEvent) -> Result<(), LlmError> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.id = message.id.clone();
                if let Some(usage) = message.usage {
                    self.usage = usage;
                }
            }
            StreamEvent::ContentBlockStart { index, block } => {
                let kind = match block {
                    ContentBlockStart::Text { text } => BlockKind::Text(text.clone()),
                    ContentBlockStart::ToolUse { id, name } => BlockKind::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        partial_json: String::new(),
                        input: None,
                    },
                };
                self.blocks.push(Block {
                    index: *index,
                    kind,
                });
            }
            StreamEvent::ContentDelta { index, delta } => match delta {
                ContentDelta::TextDelta { text } => {
                    if self.block_mut(*index).is_none() {
                        // Text without an announced block
                        self.blocks.push(Block {
                            index: *index,
                            kind: BlockKind::Text(String::new()),
                        });
                    }
                    if let Some(BlockKind::Text(buffer)) = self.block_mut(*index) {
                        buffer.push_str(text);
                    }
                }
                ContentDelta::ToolUseDelta { partial } => {
                    if let Some(BlockKind::ToolUse { partial_json, .. }) = self.block_mut(*index) {
                        partial_json.push_str(&partial.partial_json);
                    }
                }
            },
            StreamEvent::ContentBlockEnd { index } => {
                if let Some(BlockKind::ToolUse {
                    name,
                    partial_json,
                    input,
                    ..
                }) = self.block_mut(*index)
                {
                    *input = Some(parse_tool_input(name.as_str(), partial_json.as_str())?);
                }
            }
            StreamEvent::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    self.usage = *usage;
                }
            }
            StreamEvent::MessageEnd {
                finish_reason,
                usage,
            } => {
                self.finish_reason = Some(finish_reason.clone());
                self.usage = *usage;
            }
            StreamEvent::Error { error } => {
                return Err(LlmError::ProviderError {
                    code: "stream_error".to_string(),
                    message: error.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether the terminal `MessageEnd` has been seen
    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Text gathered so far
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match &block.kind {
                BlockKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Build the final response
    ///
    /// Fails if the stream never reached `MessageEnd`.
    pub fn finish(self) -> Result<GenerateResponse, LlmError> {
        let finish_reason = self.finish_reason.ok_or_else(|| {
            LlmError::StreamError("stream ended before the message was complete".to_string())
        })?;

        let mut content = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            match block.kind {
                BlockKind::Text(text) if text.is_empty() => {}
                BlockKind::Text(text) => content.push(ContentBlock::Text { text }),
                BlockKind::ToolUse {
                    id,
                    name,
                    partial_json,
                    input,
                } => {
                    let input = match input {
                        Some(input) => input,
                        // Block never closed: parse what arrived
                        None => parse_tool_input(&name, &partial_json)?,
                    };
                    content.push(ContentBlock::ToolUse { id, name, input });
                }
            }
        }

        Ok(GenerateResponse {
            id: self.id,
            content,
            finish_reason,
            usage: self.usage,
        })
    }

    fn block_mut(&mut self, index: usize) -> Option<&mut BlockKind> {
        self.blocks
            .iter_mut()
            .rev()
            .find(|block| block.index == index)
            .map(|block| &mut block.kind)
    }
}

fn parse_tool_input(name: &str, partial_json: &str) -> Result<serde_json::Value, LlmError> {
    if partial_json.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(partial_json).map_err(|e| {
        LlmError::SerializationError(format!("invalid arguments for tool '{}': {}", name, e))
    })
}
