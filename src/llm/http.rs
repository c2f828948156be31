//! Shared HTTP client construction

use std::time::Duration;

use reqwest::Client;

use crate::llm::core::error::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the client used by providers and remote tool executors
///
/// Only the connect phase is bounded; streamed generations may run long.
pub fn build_http_client() -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| LlmError::HttpError {
            status: 0,
            body: format!("Failed to create HTTP client: {}", e),
        })
}
