//! Route definitions for the `/webhooks` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`. No bearer auth; requests are signed.
///
/// ```text
/// POST /stripe       -> stripe
/// POST /mercadopago  -> mercadopago
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stripe", post(webhooks::stripe))
        .route("/mercadopago", post(webhooks::mercadopago))
}
