// Handlers module

pub mod invoke_tool;
pub mod list_tools;
pub mod rejection;
pub mod root;

pub use invoke_tool::invoke_tool_handler;
pub use list_tools::list_tools_handler;
pub use rejection::handle_rejection;
pub use root::root_handler;

use warp::http::StatusCode;

use crate::models::ErrorResponse;

/// JSON `{"detail": ...}` reply with the given status
pub(crate) fn error_reply(status: StatusCode, detail: impl Into<String>) -> warp::reply::Response {
    use warp::Reply;

    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            detail: detail.into(),
        }),
        status,
    )
    .into_response()
}
