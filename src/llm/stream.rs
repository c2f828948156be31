//! Framing for streamed HTTP response bodies
//!
//! Anthropic and the OpenAI-compatible APIs stream Server-Sent Events:
//! ```text
//! event: content_block_delta
//! data: {"type":"content_block_delta",...}
//!
//! ```
//! Ollama streams newline-delimited JSON, one object per line.
//!
//! Both parsers buffer raw bytes, so frames and multi-byte characters may be
//! split across chunks. A trailing frame without a terminator is flushed when
//! the body ends.

use async_stream::stream;
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use pin_utils::pin_mut;
use std::fmt::Display;
use std::pin::Pin;

use crate::llm::core::error::LlmError;

/// One Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    /// OpenAI-style end-of-stream sentinel
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }
}

/// Parse a byte stream as Server-Sent Events
///
/// Comment lines and events without data (keep-alives) are skipped.
pub fn sse_events<S, E>(byte_stream: S) -> Pin<Box<dyn Stream<Item = Result<SseEvent, LlmError>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(stream! {
        pin_mut!(byte_stream);
        let mut buffer = FrameBuffer::default();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    return;
                }
            };
            // JSON payloads never carry a raw CR, so dropping them normalizes CRLF framing
            buffer.extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

            while let Some(frame) = buffer.next_frame(b"\n\n") {
                match decode(&frame) {
                    Ok(text) => {
                        if let Some(event) = parse_sse_frame(text) {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decode(buffer.rest()) {
            Ok(text) => {
                if let Some(event) = parse_sse_frame(text) {
                    yield Ok(event);
                }
            }
            Err(e) => {
                yield Err(e);
            }
        }
    })
}

/// Parse a byte stream as newline-delimited JSON, yielding one line per item
///
/// Blank lines are skipped.
pub fn ndjson_lines<S, E>(byte_stream: S) -> Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(stream! {
        pin_mut!(byte_stream);
        let mut buffer = FrameBuffer::default();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    return;
                }
            };
            buffer.extend(chunk.iter().copied());

            while let Some(line) = buffer.next_frame(b"\n") {
                match decode(&line) {
                    Ok(line) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            yield Ok(line.to_string());
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decode(buffer.rest()) {
            Ok(rest) => {
                let rest = rest.trim();
                if !rest.is_empty() {
                    yield Ok(rest.to_string());
                }
            }
            Err(e) => {
                yield Err(e);
            }
        }
    })
}

/// Bytes received so far, split on a delimiter
///
/// Remembers how far the pending bytes have been searched, so a long frame
/// arriving in many small chunks is scanned once.
#[derive(Debug, Default)]
struct FrameBuffer {
    bytes: Vec<u8>,
    scanned: usize,
}

impl FrameBuffer {
    fn extend(&mut self, bytes: impl IntoIterator<Item = u8>) {
        self.bytes.extend(bytes);
    }

    /// Remove the next complete frame, without its delimiter
    fn next_frame(&mut self, delimiter: &[u8]) -> Option<Vec<u8>> {
        match find(&self.bytes[self.scanned..], delimiter) {
            Some(offset) => {
                let end = self.scanned + offset;
                let mut frame: Vec<u8> = self.bytes.drain(..end + delimiter.len()).collect();
                frame.truncate(end);
                self.scanned = 0;
                Some(frame)
            }
            None => {
                // The delimiter may straddle the next chunk
                self.scanned = self.bytes.len().saturating_sub(delimiter.len() - 1);
                None
            }
        }
    }

    /// Whatever is left after the last delimiter
    fn rest(&self) -> &[u8] {
        &self.bytes
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode(bytes: &[u8]) -> Result<&str, LlmError> {
    std::str::from_utf8(bytes)
        .map_err(|e| LlmError::StreamError(format!("Invalid UTF-8 in stream: {}", e)))
}

fn parse_sse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in frame.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event = Some(value.trim().to_string()),
            "data" => match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    let data = data?;
    if data.trim().is_empty() {
        return None;
    }

    Some(SseEvent { event, data })
}
