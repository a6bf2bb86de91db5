use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::middleware::request_id::RequestId;

const BODY_BUFFER_LIMIT: usize = 64 * 1024;
const BODY_PREVIEW_LIMIT: usize = 2048;

/// Logs every 4xx/5xx response together with a preview of its body. Client
/// errors go out at `warn`, server errors at `error`.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let latency_ms = started.elapsed().as_millis() as u64;

    let (mut parts, body) = response.into_parts();
    let (body, preview) = match to_bytes(body, BODY_BUFFER_LIMIT).await {
        Ok(bytes) => {
            let preview = body_preview(&bytes);
            (Body::from(bytes), preview)
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            (Body::empty(), format!("<unreadable body: {}>", err))
        }
    };

    emit(status, method.as_str(), &path, &request_id, latency_ms, &preview);
    Response::from_parts(parts, body)
}

fn body_preview(bytes: &Bytes) -> String {
    if bytes.len() <= BODY_PREVIEW_LIMIT {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    format!(
        "{}... ({} bytes total)",
        String::from_utf8_lossy(&bytes[..BODY_PREVIEW_LIMIT]),
        bytes.len()
    )
}

fn emit(status: StatusCode, method: &str, path: &str, request_id: &str, latency_ms: u64, body: &str) {
    let status = status.as_u16();
    if status >= 500 {
        tracing::error!(status, method, path, request_id, latency_ms, body, "Request failed");
    } else {
        tracing::warn!(status, method, path, request_id, latency_ms, body, "Request rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn long_bodies_are_truncated_in_the_preview() {
        let bytes = Bytes::from(vec![b'a'; BODY_PREVIEW_LIMIT + 10]);
        let preview = body_preview(&bytes);
        assert!(preview.ends_with(&format!("({} bytes total)", BODY_PREVIEW_LIMIT + 10)));
    }

    #[tokio::test]
    async fn error_body_is_forwarded_unchanged() {
        let app = Router::new()
            .route(
                "/fail",
                get(|| async { (StatusCode::CONFLICT, "already invoiced") }),
            )
            .layer(axum::middleware::from_fn(log_error_responses));

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"already invoiced");
    }
}
