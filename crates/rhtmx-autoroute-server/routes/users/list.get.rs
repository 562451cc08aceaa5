use axum::extract::{Query, Request};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

pub async fn handler(req: Request) -> Json<Value> {
    let limit = Query::<ListParams>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(params)| params.limit)
        .unwrap_or(10);

    let users: Vec<Value> = ["ada", "grace", "linus"]
        .iter()
        .take(limit)
        .enumerate()
        .map(|(id, name)| json!({ "id": id + 1, "name": name }))
        .collect();

    Json(json!({ "users": users }))
}
