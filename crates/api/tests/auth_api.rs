//! HTTP-level tests for registration, login, token refresh, logout and the
//! caller's profile.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, get_auth, post_json, post_json_auth, SIGNUP_BONUS};
use serde_json::json;
use sqlx::PgPool;

async fn register(pool: &PgPool, email: &str, password: &str) -> serde_json::Value {
    let app = common::build_test_app(pool.clone());
    let body = json!({ "email": email, "password": password, "name": "Ana" });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn login(pool: &PgPool, email: &str, password: &str) -> axum::http::Response<axum::body::Body> {
    let app = common::build_test_app(pool.clone());
    let body = json!({ "email": email, "password": password });
    post_json(app, "/api/v1/auth/login", body).await
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn register_creates_free_user_with_bonus(pool: PgPool) {
    let json = register(&pool, "  Ana@Example.COM ", "correct horse").await;

    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["expires_in"], 15 * 60);
    assert_eq!(json["user"]["email"], "ana@example.com");
    assert_eq!(json["user"]["plan_type"], "FREE");
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["user"]["credit_balance"], SIGNUP_BONUS);
    assert!(json["user"].get("password_hash").is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn duplicate_email_is_a_conflict(pool: PgPool) {
    register(&pool, "dup@example.com", "password123").await;

    let app = common::build_test_app(pool);
    let body = json!({ "email": "DUP@example.com", "password": "password123" });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn weak_password_and_bad_email_are_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let body = json!({ "email": "short@example.com", "password": "1234567" });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool);
    let body = json!({ "email": "not-an-email", "password": "password123" });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn login_with_correct_and_wrong_password(pool: PgPool) {
    register(&pool, "login@example.com", "password123").await;

    let response = login(&pool, "LOGIN@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["access_token"].is_string());

    let response = login(&pool, "login@example.com", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = login(&pool, "ghost@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn five_failures_lock_the_account(pool: PgPool) {
    register(&pool, "locked@example.com", "password123").await;

    for _ in 0..5 {
        let response = login(&pool, "locked@example.com", "nope-nope").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Correct password is refused while the lock holds.
    let response = login(&pool, "locked@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Refresh and logout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn refresh_rotates_the_token(pool: PgPool) {
    let registered = register(&pool, "rotate@example.com", "password123").await;
    let original = registered["refresh_token"].as_str().unwrap().to_string();

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": original })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_ne!(json["refresh_token"].as_str().unwrap(), original);

    // The old token was revoked by the rotation.
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": original })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn logout_revokes_all_sessions(pool: PgPool) {
    let registered = register(&pool, "bye@example.com", "password123").await;
    let access = registered["access_token"].as_str().unwrap();
    let refresh = registered["refresh_token"].as_str().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/auth/logout", json!({}), access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn me_requires_a_valid_token(pool: PgPool) {
    let response = get(common::build_test_app(pool.clone()), "/api/v1/user/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(common::build_test_app(pool), "/api/v1/user/me", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn me_returns_profile_with_plan_limits(pool: PgPool) {
    let registered = register(&pool, "me@example.com", "password123").await;
    let token = registered["access_token"].as_str().unwrap();

    let response = get_auth(common::build_test_app(pool), "/api/v1/user/me", token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["email"], "me@example.com");
    assert_eq!(json["data"]["name"], "Ana");
    assert_eq!(json["data"]["plan_type"], "FREE");
    assert_eq!(json["data"]["credit_balance"], SIGNUP_BONUS);
    assert_eq!(json["data"]["plan_limits"]["daily_messages"], 10);
    assert_eq!(json["data"]["plan_limits"]["monthly_tokens"], 100_000);
}
