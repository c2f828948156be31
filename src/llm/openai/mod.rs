//! OpenAI-compatible provider
//!
//! Serves OpenAI, DeepSeek and Kimi, which share the chat-completions API and
//! differ only in base URL and model names.

pub mod client;
pub mod mapper;
pub mod types;

pub use client::OpenAiClient;
