// Turns warp rejections into `{"detail": ...}` replies

use std::convert::Infallible;

use warp::http::StatusCode;
use warp::reject::Reject;
use warp::Rejection;

use super::error_reply;

/// Request body larger than the invoke limit
#[derive(Debug)]
pub struct PayloadTooLarge;

impl Reject for PayloadTooLarge {}

/// The connection failed while the body was being read
#[derive(Debug)]
pub struct BodyReadFailed(pub String);

impl Reject for BodyReadFailed {}

pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".to_string())
    } else if let Some(BodyReadFailed(message)) = err.find() {
        (StatusCode::BAD_REQUEST, format!("Failed to read request body: {}", message))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    Ok(error_reply(status, detail))
}
