//! Anthropic provider
//!
//! Streams from the Messages API (`/v1/messages`) authenticated with an
//! `x-api-key` header.

pub mod client;
pub mod mapper;
pub mod types;

pub use client::AnthropicClient;
