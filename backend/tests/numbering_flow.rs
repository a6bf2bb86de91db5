mod support;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use timesheet_backend::services::billing::BillingService;

use support::{
    bearer, date, get_request, json_request, seed_admin, seed_client, seed_seller,
    seed_timesheet, send, test_app, test_state, RecordingMailer,
};

#[sqlx::test(migrations = "./migrations")]
async fn scheme_numbers_invoices_and_counter_drift_heals(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let admin = seed_admin(&pool).await;
    let auth = bearer(&state, &admin);
    let seller = seed_seller(&pool).await;
    let client = seed_client(&pool, "Jane Doe", "jane@example.com").await;
    let app = test_app(state);

    let (status, scheme) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/invoice-numbering-schemes",
            Some(&auth),
            json!({
                "seller_id": seller.id,
                "template": "INV-{YYYY}-{SEQ:4}",
                "reset_period": "YEARLY",
                "effective_from": "2026-01-01"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(scheme["version"], json!(1));

    let billing = BillingService::new(pool.clone());
    let first = seed_timesheet(&pool, &client, date(2026, 2, 2), Decimal::ONE).await;
    let invoice = billing
        .create_invoice(client.id, seller.id, date(2026, 2, 28), &[first.id])
        .await
        .expect("first invoice");
    assert_eq!(invoice.invoice.invoice_number, "INV-2026-0001");

    // Simulate a counter that fell behind issued numbers.
    sqlx::query("UPDATE invoice_number_counters SET last_value = 0 WHERE seller_id = $1")
        .bind(seller.id)
        .execute(&pool)
        .await
        .expect("rewind counter");

    let second = seed_timesheet(&pool, &client, date(2026, 3, 2), Decimal::ONE).await;
    let invoice = billing
        .create_invoice(client.id, seller.id, date(2026, 3, 31), &[second.id])
        .await
        .expect("second invoice");
    assert_eq!(invoice.invoice.invoice_number, "INV-2026-0002");
    assert_eq!(invoice.invoice.sequence_number, 2);

    let (status, counters) = send(
        &app,
        get_request(
            &format!("/api/v1/admin/invoice-counters?seller_id={}", seller.id),
            Some(&auth),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let counters = counters.as_array().expect("counter list");
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0]["period_key"], json!("2026"));
    assert_eq!(counters[0]["last_value"], json!(2));
}

#[sqlx::test(migrations = "./migrations")]
async fn new_scheme_version_archives_previous_one(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let admin = seed_admin(&pool).await;
    let auth = bearer(&state, &admin);
    let seller = seed_seller(&pool).await;
    let app = test_app(state);

    for template in ["A-{SEQ:2}", "B-{SEQ:3}"] {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/invoice-numbering-schemes",
                Some(&auth),
                json!({
                    "seller_id": seller.id,
                    "template": template,
                    "reset_period": "NEVER",
                    "effective_from": "2026-01-01"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, active) = send(
        &app,
        get_request(
            &format!("/api/v1/invoice-numbering-schemes/active?seller_id={}", seller.id),
            Some(&auth),
        ),
    )
    .await;
    let active = active.as_array().expect("active schemes");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["template"], json!("B-{SEQ:3}"));
    assert_eq!(active[0]["version"], json!(2));

    let (_, all) = send(
        &app,
        get_request(
            &format!("/api/v1/invoice-numbering-schemes?seller_id={}", seller.id),
            Some(&auth),
        ),
    )
    .await;
    assert_eq!(all.as_array().map(Vec::len), Some(2));
}

#[sqlx::test(migrations = "./migrations")]
async fn template_preview_and_validation(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let admin = seed_admin(&pool).await;
    let auth = bearer(&state, &admin);
    let app = test_app(state);

    let (status, preview) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/invoice-numbering-schemes/preview",
            Some(&auth),
            json!({ "template": "INV/{YY}/{MM}/{SEQ:3}" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["preview"], json!("INV/26/02/001"));

    let (status, error) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/invoice-numbering-schemes/preview",
            Some(&auth),
            json!({ "template": "INV-{SEQ:2}-{SEQ:2}" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], json!("VALIDATION_ERROR"));
}
