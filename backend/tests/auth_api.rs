mod support;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

use support::{
    bearer, get_request, json_request, seed_user, seed_user_with, send, test_app, test_state,
    RecordingMailer, TEST_PASSWORD,
};

#[sqlx::test(migrations = "./migrations")]
async fn login_then_me(pool: PgPool) {
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let app = test_app(test_state(pool, RecordingMailer::new()));

    let (status, login) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": user.username, "password": TEST_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["token_type"], json!("Bearer"));
    assert_eq!(login["requires_password_change"], json!(false));
    let auth = format!("Bearer {}", login["access_token"].as_str().unwrap());

    let (status, me) = send(&app, get_request("/api/auth/me", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], json!(user.username));
    assert!(me.get("password_hash").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn wrong_password_and_missing_token_are_unauthorized(pool: PgPool) {
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let app = test_app(test_state(pool, RecordingMailer::new()));

    let (status, error) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "username": user.username, "password": "not-the-password1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["code"], json!("UNAUTHORIZED"));

    let (status, _) = send(&app, get_request("/api/v1/clients", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn password_change_revokes_earlier_tokens(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let old_auth = bearer(&state, &user);
    let app = test_app(state);

    let (status, changed) = send(
        &app,
        json_request(
            "PUT",
            "/api/auth/change-password",
            Some(&old_auth),
            json!({ "current_password": TEST_PASSWORD, "new_password": "Another-pass42" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_auth = format!("Bearer {}", changed["access_token"].as_str().unwrap());

    let (status, _) = send(&app, get_request("/api/auth/me", Some(&old_auth))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, get_request("/api/auth/me", Some(&new_auth))).await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn forced_password_change_blocks_other_routes(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let user = seed_user_with(&pool, &["ROLE_USER"], true).await;
    let auth = bearer(&state, &user);
    let app = test_app(state);

    let (status, error) = send(&app, get_request("/api/v1/clients", Some(&auth))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], json!("PASSWORD_CHANGE_REQUIRED"));

    let (status, _) = send(&app, get_request("/api/auth/me", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn admin_routes_refuse_plain_users(pool: PgPool) {
    let state = test_state(pool.clone(), RecordingMailer::new());
    let user = seed_user(&pool, &["ROLE_USER"]).await;
    let auth = bearer(&state, &user);
    let app = test_app(state);

    let (status, error) = send(&app, get_request("/api/v1/users", Some(&auth))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], json!("FORBIDDEN"));
}

#[sqlx::test(migrations = "./migrations")]
async fn views_redirect_to_login_without_a_session(pool: PgPool) {
    let app = test_app(test_state(pool, RecordingMailer::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/invoices")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}
