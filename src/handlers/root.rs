// GET / handler

use std::convert::Infallible;
use std::sync::Arc;

use crate::models::{Endpoints, RootResponse};
use crate::server::AppState;

pub async fn root_handler(state: Arc<AppState>) -> Result<impl warp::Reply, Infallible> {
    tracing::info!("GET /");

    Ok(warp::reply::json(&root_response(&state)))
}

pub fn root_response(state: &AppState) -> RootResponse {
    RootResponse {
        name: state.info.title.clone(),
        description: state.info.description.clone(),
        version: state.info.version.clone(),
        endpoints: Endpoints::default(),
        available_tools: state.registry.names(),
    }
}
