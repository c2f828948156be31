//! Ollama provider
//!
//! Streams newline-delimited JSON from `/api/chat`.

pub mod client;
pub mod mapper;
pub mod types;

pub use client::OllamaClient;
