//! Repository for the `subscriptions` table.
//!
//! The user's `plan_type` column mirrors their subscriptions: every
//! operation that changes which subscription is live also updates the plan
//! in the same transaction.

use sqlx::{PgConnection, PgPool};

use innerai_core::plans::PlanType;
use innerai_core::subscription::{SubscriptionStatus, SubscriptionUpdate};
use innerai_core::types::{DbId, Timestamp};

use crate::models::payment::NewPayment;
use crate::models::subscription::{ExpiredSubscription, NewSubscription, Subscription};
use crate::repositories::PaymentRepo;

const COLUMNS: &str = "id, user_id, plan_type, status, billing_cycle, provider, \
                       stripe_subscription_id, stripe_customer_id, mercadopago_payment_id, \
                       cancel_at_period_end, started_at, expires_at, created_at, updated_at";

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// Make `input` the user's only live subscription.
    ///
    /// In one transaction: records `payment` (if any), cancels the user's
    /// other ACTIVE subscriptions, inserts the new one and sets the user's
    /// plan. Returns `None` and changes nothing when the payment was already
    /// recorded.
    pub async fn activate(
        pool: &PgPool,
        input: &NewSubscription,
        payment: Option<&NewPayment>,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if let Some(payment) = payment {
            if PaymentRepo::insert_if_new(&mut *tx, payment).await?.is_none() {
                return Ok(None);
            }
        }

        sqlx::query(
            "UPDATE subscriptions
             SET status = 'CANCELLED', expires_at = $2, cancel_at_period_end = false
             WHERE user_id = $1 AND status = 'ACTIVE'",
        )
        .bind(input.user_id)
        .bind(input.started_at)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO subscriptions
                (user_id, plan_type, status, billing_cycle, provider, stripe_subscription_id,
                 stripe_customer_id, mercadopago_payment_id, started_at, expires_at)
             VALUES ($1, $2, 'ACTIVE', $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(input.user_id)
            .bind(input.plan.as_str())
            .bind(input.billing_cycle.as_str())
            .bind(input.provider.as_str())
            .bind(&input.stripe_subscription_id)
            .bind(&input.stripe_customer_id)
            .bind(&input.mercadopago_payment_id)
            .bind(input.started_at)
            .bind(input.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        set_plan(&mut *tx, input.user_id, input.plan).await?;

        tx.commit().await?;
        Ok(Some(subscription))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions WHERE id = $1");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The user's newest ACTIVE subscription.
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions
             WHERE user_id = $1 AND status = 'ACTIVE'
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Cancel an ACTIVE subscription effective `now` and downgrade the user
    /// unless another live subscription covers them.
    pub async fn cancel_now(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE subscriptions
             SET status = 'CANCELLED', expires_at = $2, cancel_at_period_end = false
             WHERE id = $1 AND status = 'ACTIVE'
             RETURNING {COLUMNS}"
        );
        let cancelled = sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(sub) = &cancelled {
            downgrade_if_uncovered(&mut *tx, sub.user_id, now).await?;
        }

        tx.commit().await?;
        Ok(cancelled)
    }

    /// Flag an ACTIVE subscription to end at `expires_at`. Access continues
    /// until the expiry job runs.
    pub async fn schedule_cancel(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET cancel_at_period_end = true
             WHERE id = $1 AND status = 'ACTIVE'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Cancel every ACTIVE subscription of a user and put them on FREE.
    /// Returns how many subscriptions were cancelled.
    pub async fn cancel_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE subscriptions
             SET status = 'CANCELLED', expires_at = $2, cancel_at_period_end = false
             WHERE user_id = $1 AND status = 'ACTIVE'",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        set_plan(&mut *tx, user_id, PlanType::Free).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Apply a provider-side change to the subscription with the given
    /// Stripe id.
    ///
    /// An ACTIVE result restores the subscription's plan on the user; any
    /// other result downgrades the user unless another live subscription
    /// covers them.
    pub async fn apply_stripe_update(
        pool: &PgPool,
        stripe_subscription_id: &str,
        update: &SubscriptionUpdate,
        now: Timestamp,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE subscriptions
             SET status = $2,
                 expires_at = COALESCE($3, expires_at),
                 cancel_at_period_end = $4
             WHERE stripe_subscription_id = $1
               AND status IN ('ACTIVE', 'PAST_DUE')
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Subscription>(&query)
            .bind(stripe_subscription_id)
            .bind(update.status.as_str())
            .bind(update.expires_at)
            .bind(update.cancel_at_period_end)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(sub) = &updated {
            if update.status == SubscriptionStatus::Active {
                let plan = sub.plan_type.parse().unwrap_or(PlanType::Free);
                set_plan(&mut *tx, sub.user_id, plan).await?;
            } else {
                downgrade_if_uncovered(&mut *tx, sub.user_id, now).await?;
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Cancel the ACTIVE subscription paid by a MercadoPago payment.
    pub async fn cancel_by_mercadopago_payment(
        pool: &PgPool,
        payment_id: &str,
        now: Timestamp,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE subscriptions
             SET status = 'CANCELLED', expires_at = $2, cancel_at_period_end = false
             WHERE mercadopago_payment_id = $1 AND status = 'ACTIVE'
             RETURNING {COLUMNS}"
        );
        let cancelled = sqlx::query_as::<_, Subscription>(&query)
            .bind(payment_id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(sub) = &cancelled {
            downgrade_if_uncovered(&mut *tx, sub.user_id, now).await?;
        }

        tx.commit().await?;
        Ok(cancelled)
    }

    /// ACTIVE subscriptions whose `expires_at` is before `now`.
    pub async fn list_expired_active(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions
             WHERE status = 'ACTIVE' AND expires_at < $1
             ORDER BY expires_at, id"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Mark one lapsed subscription EXPIRED and downgrade its owner.
    ///
    /// Returns `None` when the row is no longer ACTIVE-and-lapsed (another
    /// run or a webhook got there first).
    pub async fn expire(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<Option<ExpiredSubscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let row: Option<(DbId,)> = sqlx::query_as(
            "UPDATE subscriptions SET status = 'EXPIRED'
             WHERE id = $1 AND status = 'ACTIVE' AND expires_at < $2
             RETURNING user_id",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id,)) = row else {
            return Ok(None);
        };

        let downgraded = downgrade_if_uncovered(&mut *tx, user_id, now).await?;

        tx.commit().await?;
        Ok(Some(ExpiredSubscription {
            user_id,
            downgraded,
        }))
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped helpers
// ---------------------------------------------------------------------------

async fn set_plan(
    conn: &mut PgConnection,
    user_id: DbId,
    plan: PlanType,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET plan_type = $2 WHERE id = $1")
        .bind(user_id)
        .bind(plan.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Put the user on FREE unless they hold an ACTIVE subscription that has
/// not lapsed. Returns `true` if the plan changed.
async fn downgrade_if_uncovered(
    conn: &mut PgConnection,
    user_id: DbId,
    now: Timestamp,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET plan_type = 'FREE'
         WHERE id = $1
           AND plan_type <> 'FREE'
           AND NOT EXISTS (
               SELECT 1 FROM subscriptions
               WHERE user_id = $1
                 AND status = 'ACTIVE'
                 AND (expires_at IS NULL OR expires_at >= $2)
           )",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
