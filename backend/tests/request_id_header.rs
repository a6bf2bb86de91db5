use axum::{body::Body, http::Request, routing::get, Router};
use timesheet_backend::middleware::request_id::{request_id, REQUEST_ID_HEADER};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    Router::new()
        .route("/ping", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn(request_id))
}

#[tokio::test]
async fn mints_an_id_when_none_is_sent() {
    let response = app()
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn echoes_a_caller_supplied_id() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/ping")
                .header(REQUEST_ID_HEADER, "invoice-run-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "invoice-run-7");
}

#[tokio::test]
async fn replaces_an_oversized_id() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/ping")
                .header(REQUEST_ID_HEADER, "x".repeat(200))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}
