//! One-shot subscription expiry, for running from cron.
//!
//! Exits non-zero only when the lapsed subscriptions could not be listed.
//! Individual failures are logged and picked up by the next run.

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use innerai_api::background::subscription_expiry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innerai_api=info,innerai_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = innerai_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    let outcome = subscription_expiry::run_once(&pool, Utc::now()).await;
    match &outcome {
        Ok(report) if report.failed > 0 => tracing::warn!(
            scanned = report.scanned,
            expired = report.expired,
            downgraded = report.downgraded,
            failed = report.failed,
            "Subscription expiry finished with failures"
        ),
        Ok(report) => tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            downgraded = report.downgraded,
            "Subscription expiry finished"
        ),
        Err(e) => tracing::error!(error = %e, "Subscription expiry failed"),
    }

    std::process::exit(subscription_expiry::exit_code(&outcome));
}
