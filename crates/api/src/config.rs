use std::collections::HashMap;

use innerai_core::credits::DEFAULT_LOW_BALANCE_THRESHOLD;
use innerai_core::plans::{BillingCycle, PlanType};
use innerai_core::signature::DEFAULT_TOLERANCE_SECS;
use innerai_core::types::Credits;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// database URL and JWT secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Credits granted on registration (default: `0`).
    pub signup_bonus_credits: Credits,
    /// Balances below this are flagged as low (default: `100`).
    pub low_balance_threshold: Credits,
    /// How often the in-process expiry job runs (default: `3600`, must be
    /// non-zero).
    pub subscription_expiry_interval_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Payment provider credentials and checkout settings.
    pub billing: BillingConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                             | Default                 |
    /// |-------------------------------------|-------------------------|
    /// | `HOST`                              | `0.0.0.0`               |
    /// | `PORT`                              | `3000`                  |
    /// | `CORS_ORIGINS`                      | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`              | `30`                    |
    /// | `SIGNUP_BONUS_CREDITS`              | `0`                     |
    /// | `LOW_BALANCE_THRESHOLD`             | `100`                   |
    /// | `SUBSCRIPTION_EXPIRY_INTERVAL_SECS` | `3600`                  |
    ///
    /// See [`JwtConfig::from_env`] and [`BillingConfig::from_env`] for the
    /// remaining variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            signup_bonus_credits: env_parse("SIGNUP_BONUS_CREDITS", 0),
            low_balance_threshold: env_parse(
                "LOW_BALANCE_THRESHOLD",
                DEFAULT_LOW_BALANCE_THRESHOLD,
            ),
            subscription_expiry_interval_secs: require_nonzero(
                "SUBSCRIPTION_EXPIRY_INTERVAL_SECS",
                env_parse("SUBSCRIPTION_EXPIRY_INTERVAL_SECS", 3600),
            ),
            jwt: JwtConfig::from_env(),
            billing: BillingConfig::from_env(),
        }
    }
}

/// Stripe / MercadoPago settings. A provider whose key is unset is treated
/// as not configured and its checkouts fail with 503.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// Pre-created Stripe price ids per plan and cycle. Plans without one
    /// are billed with inline `price_data`.
    pub stripe_prices: HashMap<(PlanType, BillingCycle), String>,
    pub stripe_api_base: String,
    pub mercadopago_access_token: Option<String>,
    pub mercadopago_webhook_secret: Option<String>,
    pub mercadopago_api_base: String,
    /// Public URL MercadoPago posts notifications to.
    pub mercadopago_notification_url: Option<String>,
    /// Allowed clock skew for signed webhook timestamps.
    pub webhook_tolerance_secs: i64,
    /// Accept webhooks without a signature when no secret is configured.
    /// Development only.
    pub allow_unsigned_webhooks: bool,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

impl BillingConfig {
    /// | Env Var                          | Default                                         |
    /// |----------------------------------|-------------------------------------------------|
    /// | `STRIPE_SECRET_KEY`              | --                                              |
    /// | `STRIPE_WEBHOOK_SECRET`          | --                                              |
    /// | `STRIPE_PRICE_<PLAN>[_YEARLY]`   | --                                              |
    /// | `STRIPE_API_BASE`                | `https://api.stripe.com`                        |
    /// | `MERCADOPAGO_ACCESS_TOKEN`       | --                                              |
    /// | `MERCADOPAGO_WEBHOOK_SECRET`     | --                                              |
    /// | `MERCADOPAGO_API_BASE`           | `https://api.mercadopago.com`                   |
    /// | `MERCADOPAGO_NOTIFICATION_URL`   | --                                              |
    /// | `WEBHOOK_TOLERANCE_SECS`         | `300`                                           |
    /// | `ALLOW_UNSIGNED_WEBHOOKS`        | `false`                                         |
    /// | `CHECKOUT_SUCCESS_URL`           | `http://localhost:3000/dashboard?success=true`  |
    /// | `CHECKOUT_CANCEL_URL`            | `http://localhost:3000/pricing?canceled=true`   |
    pub fn from_env() -> Self {
        let mut stripe_prices = HashMap::new();
        for plan in PlanType::ALL.into_iter().filter(|p| p.is_paid()) {
            for (cycle, suffix) in [(BillingCycle::Monthly, ""), (BillingCycle::Yearly, "_YEARLY")] {
                if let Some(price) = env_opt(&format!("STRIPE_PRICE_{plan}{suffix}")) {
                    stripe_prices.insert((plan, cycle), price);
                }
            }
        }

        Self {
            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            stripe_prices,
            stripe_api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            mercadopago_access_token: env_opt("MERCADOPAGO_ACCESS_TOKEN"),
            mercadopago_webhook_secret: env_opt("MERCADOPAGO_WEBHOOK_SECRET"),
            mercadopago_api_base: std::env::var("MERCADOPAGO_API_BASE")
                .unwrap_or_else(|_| "https://api.mercadopago.com".into()),
            mercadopago_notification_url: env_opt("MERCADOPAGO_NOTIFICATION_URL"),
            webhook_tolerance_secs: env_parse("WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS),
            allow_unsigned_webhooks: env_parse("ALLOW_UNSIGNED_WEBHOOKS", false),
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/dashboard?success=true".into()),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3000/pricing?canceled=true".into()),
        }
    }
}

/// Read an optional variable, treating empty values as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} is invalid: {e}")),
        Err(_) => default,
    }
}

/// # Panics
///
/// Panics if `value` is zero.
fn require_nonzero(key: &str, value: u64) -> u64 {
    if value == 0 {
        panic!("{key} must be greater than zero");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_interval_is_kept() {
        assert_eq!(require_nonzero("SUBSCRIPTION_EXPIRY_INTERVAL_SECS", 60), 60);
    }

    #[test]
    #[should_panic(expected = "SUBSCRIPTION_EXPIRY_INTERVAL_SECS must be greater than zero")]
    fn zero_interval_is_rejected() {
        require_nonzero("SUBSCRIPTION_EXPIRY_INTERVAL_SECS", 0);
    }
}
