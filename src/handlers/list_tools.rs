// GET /mcp/list_tools handler

use std::convert::Infallible;
use std::sync::Arc;

use crate::models::ListToolsResponse;
use crate::server::AppState;

pub async fn list_tools_handler(state: Arc<AppState>) -> Result<impl warp::Reply, Infallible> {
    tracing::info!(tools = state.registry.len(), "GET /mcp/list_tools");

    let response = ListToolsResponse {
        tools: state.registry.descriptors(),
    };

    Ok(warp::reply::json(&response))
}
