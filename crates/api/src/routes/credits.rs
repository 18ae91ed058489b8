//! Route definitions for the `/credits` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{catalog, credits};
use crate::state::AppState;

/// Routes mounted at `/credits`.
///
/// ```text
/// GET  /balance  -> balance
/// GET  /history  -> history
/// GET  /stats    -> stats
/// GET  /packages -> list_packages (public)
/// POST /purchase -> purchase
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(credits::balance))
        .route("/history", get(credits::history))
        .route("/stats", get(credits::stats))
        .route("/packages", get(catalog::list_packages))
        .route("/purchase", post(credits::purchase))
}
