//! Route definitions for the `/admin` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET  /users                -> list_users
/// POST /users/{id}/credits   -> adjust_credits
/// PUT  /users/{id}/plan      -> set_plan
/// PUT  /users/{id}/active    -> set_active
/// POST /subscriptions/expire -> expire_subscriptions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/credits", post(admin::adjust_credits))
        .route("/users/{id}/plan", put(admin::set_plan))
        .route("/users/{id}/active", put(admin::set_active))
        .route("/subscriptions/expire", post(admin::expire_subscriptions))
}
