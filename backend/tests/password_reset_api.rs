mod support;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::PgPool;

use support::{get_request, json_request, seed_user, send, test_app, test_state, RecordingMailer};

fn token_from(body: &str) -> String {
    let start = body.find("token=").expect("reset link in email") + "token=".len();
    body[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect()
}

#[sqlx::test(migrations = "./migrations")]
async fn reset_token_is_single_use(pool: PgPool) {
    let mailer = RecordingMailer::new();
    let state = test_state(pool.clone(), mailer.clone());
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let email = user.email.clone().expect("seeded email");
    let app = test_app(state);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/forgot-password", None, json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("If that email exists"));

    let sent = mailer.sent_to(&email);
    assert_eq!(sent.len(), 1);
    let token = token_from(&sent[0].html_body);
    assert_eq!(token.len(), 64);

    let (status, valid) = send(
        &app,
        get_request(&format!("/api/auth/reset-password/validate?token={}", token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(valid["valid"], json!(true));
    assert_eq!(valid["username"], json!(user.username));

    let reset_body = json!({ "token": token, "new_password": "Brand-new-pass1" });
    let (status, _) = send(
        &app,
        json_request("POST", "/api/auth/reset-password", None, reset_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = send(
        &app,
        json_request("POST", "/api/auth/reset-password", None, reset_body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], json!("CONFLICT"));

    let (status, login) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": user.username, "password": "Brand-new-pass1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(login["access_token"].as_str().is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_email_gets_same_answer_and_no_mail(pool: PgPool) {
    let mailer = RecordingMailer::new();
    let app = test_app(test_state(pool, mailer.clone()));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/forgot-password",
            None,
            json!({ "email": "nobody@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("If that email exists"));
    assert!(mailer.sent().is_empty());

    let (status, _) = send(
        &app,
        get_request("/api/auth/reset-password/validate?token=deadbeef", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_requests_for_one_email_are_limited(pool: PgPool) {
    let mailer = RecordingMailer::new();
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let email = user.email.clone().expect("seeded email");
    let app = test_app(test_state(pool, mailer.clone()));

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            json_request("POST", "/api/auth/forgot-password", None, json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, error) = send(
        &app,
        json_request("POST", "/api/auth/forgot-password", None, json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error["code"], json!("RATE_LIMITED"));
    assert_eq!(mailer.sent_to(&email).len(), 3);
}
