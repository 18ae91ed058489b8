use std::sync::Arc;

use crate::billing::PaymentGateway;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: innerai_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Checkout creation and payment lookups against Stripe / MercadoPago.
    pub gateway: Arc<dyn PaymentGateway>,
}
