//! Route definitions for the `/billing` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::billing;
use crate::state::AppState;

/// Routes mounted at `/billing`.
///
/// ```text
/// POST /checkout -> checkout
/// GET  /payments -> list_payments
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(billing::checkout))
        .route("/payments", get(billing::list_payments))
}
