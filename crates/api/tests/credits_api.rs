//! HTTP-level tests for the credit balance, ledger history, stats and
//! package purchases.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json_auth, StubGateway};
use innerai_api::billing::CheckoutItem;
use innerai_core::credits::TransactionKind;
use innerai_db::models::credit_transaction::LedgerNote;
use innerai_db::repositories::CreditRepo;
use serde_json::json;
use sqlx::PgPool;

async fn fund(pool: &PgPool, user_id: i64, amount: i64) {
    CreditRepo::grant(pool, user_id, amount, TransactionKind::Bonus, &LedgerNote::new("Test funds"))
        .await
        .expect("grant should succeed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn balance_flags_low_balances(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "low@example.com").await;
    fund(&pool, user.id, 40).await;

    let response = get_auth(common::build_test_app(pool.clone()), "/api/v1/credits/balance", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["balance"], 40);
    assert_eq!(json["data"]["is_low_balance"], true);
    assert_eq!(json["data"]["low_balance_threshold"], 100);

    fund(&pool, user.id, 60).await;
    let response = get_auth(common::build_test_app(pool), "/api/v1/credits/balance", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["balance"], 100);
    assert_eq!(json["data"]["is_low_balance"], false);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn history_is_newest_first_and_paginated(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "history@example.com").await;
    fund(&pool, user.id, 10).await;
    fund(&pool, user.id, 20).await;
    fund(&pool, user.id, 30).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/credits/history?limit=2", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let page = &json["data"];
    assert_eq!(page["total"], 3);
    assert_eq!(page["limit"], 2);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["amount"], 30);
    assert_eq!(items[0]["balance_before"], 30);
    assert_eq!(items[0]["balance_after"], 60);
    assert_eq!(items[1]["amount"], 20);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn stats_split_month_and_lifetime(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "stats@example.com").await;
    fund(&pool, user.id, 300).await;
    let note = LedgerNote::new("Image Generation");
    CreditRepo::consume(&pool, user.id, 135, &note).await.unwrap();

    let response = get_auth(common::build_test_app(pool), "/api/v1/credits/stats", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["balance"], 165);
    assert_eq!(json["data"]["this_month"]["consumed"], 135);
    assert_eq!(json["data"]["lifetime"]["consumed"], 135);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn purchase_opens_a_checkout_without_granting(pool: PgPool) {
    let (user, token) = common::create_user(&pool, "buyer@example.com").await;
    let gateway = Arc::new(StubGateway::default());

    let app = common::build_test_app_with(pool.clone(), gateway.clone(), common::test_config());
    let body = json!({ "package_id": "pkg_10k", "payment_method": "pix" });
    let response = post_json_auth(app, "/api/v1/credits/purchase", body, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["provider"], "MERCADO_PAGO");
    assert!(json["data"]["url"].as_str().unwrap().starts_with("https://"));

    let checkouts = gateway.checkouts.lock().unwrap();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].user_id, user.id);
    assert_eq!(checkouts[0].email, "buyer@example.com");
    match checkouts[0].item {
        CheckoutItem::Package(package) => assert_eq!(package.id, "pkg_10k"),
        other => panic!("expected a package checkout, got {other:?}"),
    }
    drop(checkouts);

    // Credits only arrive with the payment webhook.
    assert_eq!(CreditRepo::balance(&pool, user.id).await.unwrap(), Some(0));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn purchase_rejects_unknown_package(pool: PgPool) {
    let (_user, token) = common::create_user(&pool, "nopkg@example.com").await;
    let gateway = Arc::new(StubGateway::default());

    let app = common::build_test_app_with(pool, gateway.clone(), common::test_config());
    let body = json!({ "package_id": "pkg_1m", "payment_method": "card" });
    let response = post_json_auth(app, "/api/v1/credits/purchase", body, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(gateway.checkout_count(), 0);
}
