//! Route definitions for the `/metering` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::metering;
use crate::state::AppState;

/// Routes mounted at `/metering`.
///
/// ```text
/// POST /authorize        -> authorize
/// POST /charge           -> charge
/// POST /tools/{tool_id}  -> charge_tool
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authorize", post(metering::authorize))
        .route("/charge", post(metering::charge))
        .route("/tools/{tool_id}", post(metering::charge_tool))
}
