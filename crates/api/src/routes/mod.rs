pub mod admin;
pub mod auth;
pub mod billing;
pub mod catalog;
pub mod credits;
pub mod health;
pub mod metering;
pub mod subscription;
pub mod usage;
pub mod users;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                     register (public)
/// /auth/login                        login (public)
/// /auth/refresh                      refresh (public)
/// /auth/logout                       logout (requires auth)
///
/// /user/me                           caller profile and plan limits
///
/// /plans                             plan catalog (public)
/// /models                            model and tool catalog for the caller
///
/// /credits/balance                   balance and low-balance flag
/// /credits/history                   paginated ledger
/// /credits/stats                     monthly and lifetime totals
/// /credits/packages                  package catalog (public)
/// /credits/purchase                  open a package checkout (POST)
///
/// /usage/today                       messages used today
/// /usage/stats                       daily and monthly usage
///
/// /metering/authorize                allow/deny one message (POST)
/// /metering/charge                   bill a completion (POST)
/// /metering/tools/{tool_id}          bill one tool use (POST)
///
/// /subscription                      get, cancel (GET, DELETE)
///
/// /billing/checkout                  open a plan checkout (POST)
/// /billing/payments                  payment history
///
/// /webhooks/stripe                   Stripe events (signed)
/// /webhooks/mercadopago              MercadoPago notifications (signed)
///
/// /admin/users                       list users (admin only)
/// /admin/users/{id}/credits          grant or remove credits (POST)
/// /admin/users/{id}/plan             set plan (PUT)
/// /admin/users/{id}/active           activate, deactivate (PUT)
/// /admin/subscriptions/expire        run the expiry pass (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (register, login, refresh, logout).
        .nest("/auth", auth::router())
        // Caller profile.
        .nest("/user", users::router())
        // Public and per-plan catalogs.
        .merge(catalog::router())
        // Credit ledger and package purchases.
        .nest("/credits", credits::router())
        // Usage counters.
        .nest("/usage", usage::router())
        // Plan enforcement and billing of completions.
        .nest("/metering", metering::router())
        // Current subscription.
        .nest("/subscription", subscription::router())
        // Plan checkout and payments.
        .nest("/billing", billing::router())
        // Payment provider callbacks.
        .nest("/webhooks", webhooks::router())
        // Admin: users, credits, plans, expiry.
        .nest("/admin", admin::router())
}
