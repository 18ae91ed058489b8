//! Route definitions for the `/user` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/user`.
///
/// ```text
/// GET /me -> me
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(users::me))
}
