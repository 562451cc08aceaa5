use axum::extract::Request;
use axum::Json;
use serde_json::{json, Value};

pub async fn handler(_req: Request) -> Json<Value> {
    Json(json!({ "service": "rhtmx-autoroute", "status": "ok" }))
}
