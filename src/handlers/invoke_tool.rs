// POST /mcp/invoke/{tool_name} handler

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use pin_utils::pin_mut;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use super::error_reply;
use super::rejection::{BodyReadFailed, PayloadTooLarge};
use crate::models::InvokeResponse;
use crate::server::AppState;
use crate::toolkit::{InvokeError, ToolRegistry};

pub async fn invoke_tool_handler(
    tool_name: String,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    match invoke_tool(&state.registry, &tool_name, &body).await {
        Ok(response) => {
            tracing::info!(tool = %tool_name, status = 200, "POST /mcp/invoke");
            Ok(warp::reply::json(&response).into_response())
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(tool = %tool_name, status = status.as_u16(), error = %err, "POST /mcp/invoke");
            Ok(error_reply(status, err.to_string()))
        }
    }
}

/// Look up, validate, call and wrap: the whole invoke pipeline minus HTTP
pub async fn invoke_tool(
    registry: &ToolRegistry,
    tool_name: &str,
    body: &[u8],
) -> Result<InvokeResponse, InvokeError> {
    // Unknown tools are reported before the body is looked at
    if !registry.contains(tool_name) {
        return Err(InvokeError::NotFound {
            name: tool_name.to_string(),
            available: registry.names(),
        });
    }

    let payload = parse_payload(body)?;
    let result = registry.invoke(tool_name, payload).await?;

    Ok(InvokeResponse::success(result))
}

/// Collect a request body of at most `limit` bytes
///
/// A declared `Content-Length` over the limit is refused before anything is
/// read. Bodies without one (empty or chunked) are counted as they arrive.
pub async fn read_body<S, B, E>(
    content_length: Option<u64>,
    body: S,
    limit: u64,
) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: Display,
{
    if content_length.is_some_and(|length| length > limit) {
        return Err(warp::reject::custom(PayloadTooLarge));
    }

    pin_mut!(body);
    let mut collected = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| warp::reject::custom(BodyReadFailed(e.to_string())))?;
        if (collected.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(PayloadTooLarge));
        }
        collected.put(chunk);
    }

    Ok(collected.freeze())
}

/// Parse an optional JSON object body
///
/// An empty (or whitespace-only) body means "no payload".
pub fn parse_payload(body: &[u8]) -> Result<Option<serde_json::Value>, InvokeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| InvokeError::InvalidInput(format!("body is not valid JSON: {}", e)))?;

    match payload {
        serde_json::Value::Object(_) | serde_json::Value::Null => Ok(Some(payload)),
        other => Err(InvokeError::InvalidInput(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("add", "Add two numbers", |args: AddArgs| {
                Ok::<_, String>(args.a + args.b)
            })
            .unwrap();
        registry
            .register_sync("fail", "Always fails", |_: AddArgs| {
                Err::<i64, _>("nope")
            })
            .unwrap();
        registry
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, String>> {
        let parts: Vec<Result<Bytes, String>> =
            parts.iter().map(|&part| Ok(Bytes::from_static(part))).collect();
        futures::stream::iter(parts)
    }

    #[tokio::test]
    async fn test_read_body_without_content_length() {
        let body = read_body(None, chunks(&[]), 16).await.unwrap();
        assert!(body.is_empty());

        // Chunked transfer: no length header, several pieces
        let body = read_body(None, chunks(&[b"{\"a\"", b": 1}"]), 16).await.unwrap();
        assert_eq!(&body[..], br#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let err = read_body(Some(17), chunks(&[]), 16).await.unwrap_err();
        assert!(err.find::<PayloadTooLarge>().is_some());

        let err = read_body(None, chunks(&[b"0123456789", b"0123456789"]), 16)
            .await
            .unwrap_err();
        assert!(err.find::<PayloadTooLarge>().is_some());

        let body = read_body(Some(16), chunks(&[b"0123456789", b"012345"]), 16)
            .await
            .unwrap();
        assert_eq!(body.len(), 16);
    }

    #[tokio::test]
    async fn test_read_body_transport_error() {
        let parts: Vec<Result<Bytes, String>> =
            vec![Ok(Bytes::from_static(b"{")), Err("connection reset".to_string())];
        let err = read_body(None, futures::stream::iter(parts), 16)
            .await
            .unwrap_err();
        match err.find::<BodyReadFailed>() {
            Some(BodyReadFailed(message)) => assert_eq!(message, "connection reset"),
            None => panic!("expected a body read failure, got {:?}", err),
        }
    }

    #[test]
    fn test_parse_payload_empty_body() {
        assert_eq!(parse_payload(b"").unwrap(), None);
        assert_eq!(parse_payload(b"  \n").unwrap(), None);
    }

    #[test]
    fn test_parse_payload_object() {
        assert_eq!(parse_payload(br#"{"a": 1}"#).unwrap(), Some(json!({"a": 1})));
        assert_eq!(parse_payload(b"null").unwrap(), Some(serde_json::Value::Null));
    }

    #[test]
    fn test_parse_payload_rejects_non_objects() {
        let err = parse_payload(b"[1, 2]").unwrap_err();
        assert_eq!(
            err,
            InvokeError::InvalidInput("expected a JSON object, got an array".to_string())
        );
        assert_eq!(parse_payload(b"{not json").unwrap_err().status_code(), 422);
    }

    #[tokio::test]
    async fn test_invoke_success_envelope() {
        let response = invoke_tool(&registry(), "add", br#"{"a": 2, "b": 40}"#)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"result": 42, "status": "success"})
        );
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_ignores_body() {
        let err = invoke_tool(&registry(), "missing", b"{broken").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_string(),
            "Tool 'missing' not found. Available: ['add', 'fail']"
        );
    }

    #[tokio::test]
    async fn test_invoke_invalid_input() {
        let err = invoke_tool(&registry(), "add", br#"{"a": 2}"#).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().starts_with("Invalid input parameters: "));
    }

    #[tokio::test]
    async fn test_invoke_execution_failure() {
        let err = invoke_tool(&registry(), "fail", br#"{"a": 1, "b": 1}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Tool execution failed: nope");
    }

    #[tokio::test]
    async fn test_handler_maps_status_codes() {
        let state = Arc::new(AppState {
            registry: registry(),
            info: Default::default(),
        });

        let ok = invoke_tool_handler(
            "add".to_string(),
            Bytes::from_static(br#"{"a": 1, "b": 1}"#),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let not_found = invoke_tool_handler("nope".to_string(), Bytes::new(), state.clone())
            .await
            .unwrap();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = invoke_tool_handler("add".to_string(), Bytes::new(), state)
            .await
            .unwrap();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
