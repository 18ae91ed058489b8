//! Route definitions for the `/usage` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::usage;
use crate::state::AppState;

/// Routes mounted at `/usage`.
///
/// ```text
/// GET /today -> today
/// GET /stats -> stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/today", get(usage::today))
        .route("/stats", get(usage::stats))
}
