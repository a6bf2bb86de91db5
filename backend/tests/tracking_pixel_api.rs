mod support;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sqlx::PgPool;
use timesheet_backend::services::{billing::BillingService, email_tracking::TRANSPARENT_PNG};
use tower::ServiceExt;
use uuid::Uuid;

use support::{
    bearer, date, get_request, seed_admin, seed_client, seed_seller, seed_timesheet, send,
    test_app, test_state, RecordingMailer,
};

async fn fetch_pixel(app: &axum::Router, path: &str) -> (StatusCode, Vec<u8>, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body, content_type)
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_and_malformed_tokens_still_get_the_pixel(pool: PgPool) {
    let app = test_app(test_state(pool, RecordingMailer::new()));

    for path in [
        format!("/api/track/{}.png", Uuid::new_v4()),
        "/api/track/not-a-token.png".to_string(),
        "/api/track/no-suffix".to_string(),
    ] {
        let (status, body, content_type) = fetch_pixel(&app, &path).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        assert_eq!(content_type, "image/png");
        assert_eq!(body, TRANSPARENT_PNG.to_vec());
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn first_open_sets_both_timestamps_and_later_opens_only_the_last(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let seller = seed_seller(&pool).await;
    let client = seed_client(&pool, "Jane Doe", "jane@example.com").await;
    let sheet = seed_timesheet(&pool, &client, date(2026, 3, 3), Decimal::new(200, 2)).await;
    let invoice = BillingService::new(pool.clone())
        .create_invoice(client.id, seller.id, date(2026, 3, 31), &[sheet.id])
        .await
        .expect("invoice")
        .invoice;
    let tracking = state
        .tracking()
        .create_tracking(invoice.id)
        .await
        .expect("tracking row");
    let admin = seed_admin(&pool).await;
    let auth = bearer(&state, &admin);
    let app = test_app(state.clone());
    let path = format!("/api/track/{}.png", tracking.tracking_token);

    let (status, _, _) = fetch_pixel(&app, &path).await;
    assert_eq!(status, StatusCode::OK);
    let after_first = state
        .tracking()
        .find_for_invoice(invoice.id)
        .await
        .expect("lookup")
        .pop()
        .expect("tracking exists");
    assert_eq!(after_first.open_count, 1);
    assert!(after_first.opened_at.is_some());
    assert_eq!(after_first.opened_at, after_first.last_opened_at);
    assert_eq!(after_first.device_type.as_deref(), Some("Mobile"));

    let (status, _, _) = fetch_pixel(&app, &path).await;
    assert_eq!(status, StatusCode::OK);
    let after_second = state
        .tracking()
        .find_for_invoice(invoice.id)
        .await
        .expect("lookup")
        .pop()
        .expect("tracking exists");
    assert_eq!(after_second.open_count, 2);
    assert_eq!(after_second.opened_at, after_first.opened_at);
    assert!(after_second.last_opened_at > after_first.last_opened_at);

    let mirrored = state.invoices().get(invoice.id).await.expect("invoice");
    assert_eq!(mirrored.email_open_count, 2);
    assert_eq!(mirrored.email_opened_at, after_first.opened_at);

    let (status, stats) = send(&app, get_request("/api/v1/tracking/stats", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_tracked"], serde_json::json!(1));
    assert_eq!(stats["opened"], serde_json::json!(1));
}

#[sqlx::test(migrations = "./migrations")]
async fn health_reports_tracking_flag(pool: PgPool) {
    let app = test_app(test_state(pool, RecordingMailer::new()));
    let (status, body) = send(&app, get_request("/api/track/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], serde_json::json!("UP"));
    assert_eq!(body["tracking_enabled"], serde_json::json!(true));
}
