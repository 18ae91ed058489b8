//! Catalog routes. Merged at the `/api/v1` root; the package catalog lives
//! under `/credits`.

use axum::routing::get;
use axum::Router;

use crate::handlers::catalog;
use crate::state::AppState;

/// ```text
/// GET /plans  -> list_plans (public)
/// GET /models -> list_models (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(catalog::list_plans))
        .route("/models", get(catalog::list_models))
}
