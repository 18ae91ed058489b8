//! HTTP-level tests for plan enforcement, completion billing, tool billing
//! and the usage summaries.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json_auth};
use innerai_core::credits::TransactionKind;
use innerai_core::plans::PlanType;
use innerai_db::models::credit_transaction::LedgerNote;
use innerai_db::repositories::{CreditRepo, UserRepo};
use serde_json::json;
use sqlx::PgPool;

async fn fund(pool: &PgPool, user_id: i64, amount: i64) {
    CreditRepo::grant(pool, user_id, amount, TransactionKind::Bonus, &LedgerNote::new("Test funds"))
        .await
        .expect("grant should succeed");
}

async fn charge(pool: &PgPool, token: &str, body: serde_json::Value) -> axum::http::Response<axum::body::Body> {
    let app = common::build_test_app(pool.clone());
    post_json_auth(app, "/api/v1/metering/charge", body, token).await
}

async fn authorize(pool: &PgPool, token: &str, model: &str) -> axum::http::Response<axum::body::Body> {
    let app = common::build_test_app(pool.clone());
    post_json_auth(app, "/api/v1/metering/authorize", json!({ "model": model }), token).await
}

// ---------------------------------------------------------------------------
// Authorize
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn free_user_may_use_free_models(pool: PgPool) {
    let (_user, token) = common::create_user(&pool, "free@example.com").await;

    let response = authorize(&pool, &token, "gpt-3.5-turbo").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["allowed"], true);
    assert_eq!(json["data"]["plan_type"], "FREE");
    assert_eq!(json["data"]["daily_messages_used"], 0);
    assert_eq!(json["data"]["daily_messages_remaining"], 10);
    assert_eq!(json["data"]["monthly_tokens_remaining"], 100_000);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn model_outside_plan_is_forbidden(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "gated@example.com").await;

    let response = authorize(&pool, &token, "gpt-4").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");

    UserRepo::set_plan(&pool, user.id, PlanType::Pro).await.unwrap();
    let response = authorize(&pool, &token, "gpt-4").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_model_is_a_validation_error(pool: PgPool) {
    let (_user, token) = common::create_user(&pool, "typo@example.com").await;

    let response = authorize(&pool, &token, "gpt-99").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn daily_limit_blocks_the_eleventh_message(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "chatty@example.com").await;
    fund(&pool, user.id, 1_000).await;

    let body = json!({ "model": "gpt-3.5-turbo", "input_tokens": 1_000, "output_tokens": 1_000 });
    for _ in 0..10 {
        let response = charge(&pool, &token, body.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = authorize(&pool, &token, "gpt-3.5-turbo").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["code"], "LIMIT_EXCEEDED");
    assert!(json["error"].as_str().unwrap().contains("10/10"));
}

// ---------------------------------------------------------------------------
// Charge
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn charge_debits_and_counts_usage(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "charge@example.com").await;
    fund(&pool, user.id, 150).await;

    // gpt-3.5-turbo: 1 000 input / 3 000 output credits per million tokens.
    let body = json!({
        "model": "gpt-3.5-turbo",
        "input_tokens": 1_000,
        "output_tokens": 1_000,
        "reference_id": "msg_1",
    });
    let response = charge(&pool, &token, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["credits_charged"], 4);
    assert_eq!(json["data"]["balance"], 146);
    assert_eq!(json["data"]["is_low_balance"], false);
    assert_eq!(json["data"]["usage"]["messages_count"], 1);
    assert_eq!(json["data"]["usage"]["input_tokens"], 1_000);

    let history = CreditRepo::history(&pool, user.id, 1, 0).await.unwrap();
    assert_eq!(history[0].kind, "CONSUMPTION");
    assert_eq!(history[0].amount, -4);
    assert_eq!(history[0].reference_id.as_deref(), Some("msg_1"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn insufficient_credits_leave_usage_untouched(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "broke@example.com").await;
    fund(&pool, user.id, 3).await;

    let body = json!({ "model": "gpt-3.5-turbo", "input_tokens": 1_000, "output_tokens": 1_000 });
    let response = charge(&pool, &token, body).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INSUFFICIENT_CREDITS");

    assert_eq!(CreditRepo::balance(&pool, user.id).await.unwrap(), Some(3));

    let app = common::build_test_app(pool);
    let json = body_json(get_auth(app, "/api/v1/usage/today", &token).await).await;
    assert_eq!(json["data"]["messages_used"], 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn charge_rejects_negative_tokens_and_gated_models(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "bad@example.com").await;
    fund(&pool, user.id, 1_000).await;

    let body = json!({ "model": "gpt-3.5-turbo", "input_tokens": -1, "output_tokens": 10 });
    let response = charge(&pool, &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json!({ "model": "claude-3-opus", "input_tokens": 10, "output_tokens": 10 });
    let response = charge(&pool, &token, body).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(CreditRepo::balance(&pool, user.id).await.unwrap(), Some(1_000));
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn tool_use_costs_its_flat_price(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "tools@example.com").await;
    fund(&pool, user.id, 100).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/metering/tools/image-generation", json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    fund(&pool, user.id, 100).await;
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, "/api/v1/metering/tools/image-generation", json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["credits_charged"], 135);
    assert_eq!(json["data"]["balance"], 65);
    assert_eq!(json["data"]["is_low_balance"], true);

    let app = common::build_test_app(pool);
    let response = post_json_auth(app, "/api/v1/metering/tools/teleport", json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Usage summaries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn usage_today_and_stats_reflect_charges(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "usage@example.com").await;
    fund(&pool, user.id, 1_000).await;

    let body = json!({ "model": "gpt-3.5-turbo", "input_tokens": 2_000, "output_tokens": 1_000 });
    charge(&pool, &token, body).await;
    let body = json!({ "model": "mistral-7b", "input_tokens": 500, "output_tokens": 500 });
    charge(&pool, &token, body).await;

    let app = common::build_test_app(pool.clone());
    let json = body_json(get_auth(app, "/api/v1/usage/today", &token).await).await;
    assert_eq!(json["data"]["plan_type"], "FREE");
    assert_eq!(json["data"]["messages_used"], 2);
    assert_eq!(json["data"]["daily_limit"], 10);
    assert_eq!(json["data"]["remaining"], 8);
    assert_eq!(json["data"]["by_model"].as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool);
    let json = body_json(get_auth(app, "/api/v1/usage/stats", &token).await).await;
    assert_eq!(json["data"]["daily"]["messages"]["used"], 2);
    assert_eq!(json["data"]["monthly"]["messages"], 2);
    assert_eq!(json["data"]["monthly"]["tokens"]["used"], 4_000);
    assert_eq!(json["data"]["monthly"]["tokens"]["remaining"], 96_000);
    assert_eq!(json["data"]["models_allowed"].as_array().unwrap().len(), 4);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn enterprise_reports_unlimited_allowances(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "corp@example.com").await;
    UserRepo::set_plan(&pool, user.id, PlanType::Enterprise).await.unwrap();

    let app = common::build_test_app(pool);
    let json = body_json(get_auth(app, "/api/v1/usage/today", &token).await).await;
    assert!(json["data"]["daily_limit"].is_null());
    assert!(json["data"]["remaining"].is_null());
}
