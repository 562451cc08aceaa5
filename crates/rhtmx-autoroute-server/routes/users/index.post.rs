use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

const MAX_BODY: usize = 64 * 1024;

pub async fn handler(req: Request) -> Response {
    let bytes = match to_bytes(req.into_body(), MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(user) => (StatusCode::CREATED, Json(json!({ "created": user }))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}
