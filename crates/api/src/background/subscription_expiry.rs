//! Subscription expiry.
//!
//! Moves lapsed ACTIVE subscriptions to EXPIRED and drops their owners to
//! FREE unless another live subscription still covers them. Each
//! subscription is handled in its own transaction; one failure does not
//! stop the run.

use std::time::Duration;

use chrono::Utc;
use innerai_core::types::Timestamp;
use innerai_db::repositories::SubscriptionRepo;
use innerai_db::DbPool;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Outcome of one expiry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    /// Lapsed ACTIVE subscriptions found.
    pub scanned: usize,
    /// Subscriptions moved to EXPIRED by this pass.
    pub expired: usize,
    /// Users put back on FREE.
    pub downgraded: usize,
    pub failed: usize,
}

/// Process exit code for a one-shot pass.
///
/// Only a pass that could not list its candidates fails; subscriptions that
/// failed individually are counted in the report and retried next run.
pub fn exit_code(outcome: &Result<ExpiryReport, sqlx::Error>) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Expire everything that lapsed before `now`.
///
/// Only listing the candidates can fail the whole pass.
pub async fn run_once(pool: &DbPool, now: Timestamp) -> Result<ExpiryReport, sqlx::Error> {
    let candidates = SubscriptionRepo::list_expired_active(pool, now).await?;
    let mut report = ExpiryReport {
        scanned: candidates.len(),
        ..ExpiryReport::default()
    };

    for sub in &candidates {
        match SubscriptionRepo::expire(pool, sub.id, now).await {
            Ok(Some(expired)) => {
                report.expired += 1;
                if expired.downgraded {
                    report.downgraded += 1;
                }
                tracing::info!(
                    subscription_id = sub.id,
                    user_id = expired.user_id,
                    downgraded = expired.downgraded,
                    "Subscription expired"
                );
            }
            Ok(None) => {
                tracing::debug!(subscription_id = sub.id, "Subscription no longer due");
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!(subscription_id = sub.id, error = %e, "Failed to expire subscription");
            }
        }
    }

    Ok(report)
}

/// Run [`run_once`] every `every` until `cancel` fires. The first pass runs
/// immediately.
pub async fn run(pool: DbPool, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Subscription expiry job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Subscription expiry job stopping");
                break;
            }
            _ = interval.tick() => {
                match run_once(&pool, Utc::now()).await {
                    Ok(report) if report.scanned > 0 => {
                        tracing::info!(
                            scanned = report.scanned,
                            expired = report.expired,
                            downgraded = report.downgraded,
                            failed = report.failed,
                            "Subscription expiry pass finished"
                        );
                    }
                    Ok(_) => tracing::debug!("Subscription expiry: nothing to expire"),
                    Err(e) => tracing::error!(error = %e, "Subscription expiry pass failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn individual_failures_do_not_fail_the_run() {
        let report = ExpiryReport {
            scanned: 3,
            expired: 1,
            downgraded: 1,
            failed: 2,
        };
        assert_eq!(exit_code(&Ok(report)), 0);
    }

    #[test]
    fn listing_failure_fails_the_run() {
        assert_eq!(exit_code(&Err(sqlx::Error::PoolTimedOut)), 1);
    }
}
