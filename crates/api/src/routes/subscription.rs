//! Route definitions for the `/subscription` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::subscription;
use crate::state::AppState;

/// Routes mounted at `/subscription`.
///
/// ```text
/// GET    /                       -> get_subscription
/// DELETE /?at_period_end=bool    -> cancel_subscription
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(subscription::get_subscription).delete(subscription::cancel_subscription),
    )
}
