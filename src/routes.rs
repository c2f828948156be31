// Route definitions

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures::Stream;
use warp::{Filter, Rejection};

use crate::handlers;
use crate::server::AppState;

/// Largest accepted invoke payload
const MAX_PAYLOAD_BYTES: u64 = 4 * 1024 * 1024;

pub fn configure_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let with_state = warp::any().map(move || state.clone());

    // GET /
    let root = warp::path::end()
        .and(warp::get())
        .and(with_state.clone())
        .and_then(handlers::root_handler);

    // GET /mcp/list_tools
    let list_tools = warp::path("mcp")
        .and(warp::path("list_tools"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state.clone())
        .and_then(handlers::list_tools_handler);

    // POST /mcp/invoke/{tool_name}
    let invoke_tool = warp::path("mcp")
        .and(warp::path("invoke"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::post())
        .and(limited_body())
        .and(with_state)
        .and_then(handlers::invoke_tool_handler);

    // Combine routes
    root.or(list_tools)
        .or(invoke_tool)
        .recover(handlers::handle_rejection)
}

// Bodies may come without a Content-Length (bodyless or chunked POSTs)
fn limited_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(read_invoke_body)
}

async fn read_invoke_body<S, B, E>(content_length: Option<u64>, body: S) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: Display,
{
    handlers::invoke_tool::read_body(content_length, body, MAX_PAYLOAD_BYTES).await
}
