//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn health_check_returns_ok_with_json(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_route_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn response_contains_x_request_id_header(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36, "x-request-id should be a UUID");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn public_catalogs_need_no_token(pool: PgPool) {
    let response = get(common::build_test_app(pool.clone()), "/api/v1/plans").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let plans = json["data"].as_array().unwrap();
    assert_eq!(plans.len(), 4);
    assert_eq!(plans[0]["plan"], "FREE");
    assert_eq!(plans[0]["limits"]["daily_messages"], 10);

    let response = get(common::build_test_app(pool.clone()), "/api/v1/credits/packages").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    let response = get(common::build_test_app(pool), "/api/v1/models").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
