use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

pub async fn middleware(req: Request, next: Next) -> Response {
    debug!(uri = %req.uri(), "users scope");
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("x-route-scope", HeaderValue::from_static("users"));
    response
}
