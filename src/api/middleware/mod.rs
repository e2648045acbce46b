use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// Attaches an x-request-id to request and response, generating one when the
/// client did not send it.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match HeaderValue::from_str(&request_id) {
        Ok(value) => {
            req.headers_mut().insert("x-request-id", value.clone());
            let mut response = next.run(req).await;
            response.headers_mut().insert("x-request-id", value);
            response
        }
        Err(_) => next.run(req).await,
    }
}
