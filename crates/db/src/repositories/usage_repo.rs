//! Repository for the `user_usage` daily counters.

use chrono::NaiveDate;
use sqlx::PgPool;

use innerai_core::credits::TransactionKind;
use innerai_core::types::DbId;
use innerai_core::usage::{UsageSnapshot, UsageWindow};

use crate::error::LedgerError;
use crate::models::usage::{RecordUsage, UsageAggregate, UsageCharge, UserUsage};
use crate::repositories::credit_repo::{apply_debit, lock_balance};

const COLUMNS: &str = "id, user_id, model_id, usage_date, messages_count, input_tokens, \
                       output_tokens, credits_charged";

pub struct UsageRepo;

impl UsageRepo {
    /// Charge and count one completion atomically.
    ///
    /// Debits `input.credits` (when non-zero) and bumps the (user, model,
    /// day) counters by one message and the given tokens. An insufficient
    /// balance aborts the whole transaction so no usage is recorded.
    pub async fn record_with_charge(
        pool: &PgPool,
        input: &RecordUsage,
    ) -> Result<UsageCharge, LedgerError> {
        let mut tx = pool.begin().await?;

        let balance_after = if input.credits > 0 {
            apply_debit(
                &mut *tx,
                input.user_id,
                input.credits,
                TransactionKind::Consumption,
                &input.note,
            )
            .await?
            .balance_after
        } else {
            lock_balance(&mut *tx, input.user_id).await?
        };

        let query = format!(
            "INSERT INTO user_usage
                (user_id, model_id, usage_date, messages_count, input_tokens, output_tokens,
                 credits_charged)
             VALUES ($1, $2, $3, 1, $4, $5, $6)
             ON CONFLICT (user_id, model_id, usage_date) DO UPDATE SET
                messages_count = user_usage.messages_count + 1,
                input_tokens = user_usage.input_tokens + EXCLUDED.input_tokens,
                output_tokens = user_usage.output_tokens + EXCLUDED.output_tokens,
                credits_charged = user_usage.credits_charged + EXCLUDED.credits_charged
             RETURNING {COLUMNS}"
        );
        let usage = sqlx::query_as::<_, UserUsage>(&query)
            .bind(input.user_id)
            .bind(&input.model_id)
            .bind(input.usage_date)
            .bind(input.input_tokens.max(0))
            .bind(input.output_tokens.max(0))
            .bind(input.credits)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(UsageCharge {
            usage,
            credits_charged: input.credits,
            balance_after,
        })
    }

    /// Per-model counters for one day.
    pub async fn list_for_day(
        pool: &PgPool,
        user_id: DbId,
        date: NaiveDate,
    ) -> Result<Vec<UserUsage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_usage
             WHERE user_id = $1 AND usage_date = $2
             ORDER BY model_id"
        );
        sqlx::query_as::<_, UserUsage>(&query)
            .bind(user_id)
            .bind(date)
            .fetch_all(pool)
            .await
    }

    /// Summed counters over `window`.
    pub async fn totals(
        pool: &PgPool,
        user_id: DbId,
        window: &UsageWindow,
    ) -> Result<UsageAggregate, sqlx::Error> {
        sqlx::query_as::<_, UsageAggregate>(
            "SELECT
                COALESCE(SUM(messages_count), 0)::BIGINT AS messages,
                COALESCE(SUM(input_tokens), 0)::BIGINT AS input_tokens,
                COALESCE(SUM(output_tokens), 0)::BIGINT AS output_tokens,
                COALESCE(SUM(credits_charged), 0)::BIGINT AS credits
             FROM user_usage
             WHERE user_id = $1 AND usage_date >= $2 AND usage_date < $3",
        )
        .bind(user_id)
        .bind(window.start_date())
        .bind(window.end_date())
        .fetch_one(pool)
        .await
    }

    /// The counters the limit check needs: messages on `day`, tokens in
    /// `month`.
    pub async fn snapshot(
        pool: &PgPool,
        user_id: DbId,
        day: &UsageWindow,
        month: &UsageWindow,
    ) -> Result<UsageSnapshot, sqlx::Error> {
        let (daily_messages, monthly_tokens): (i64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(messages_count) FILTER (WHERE usage_date = $2), 0)::BIGINT,
                COALESCE(SUM(input_tokens + output_tokens), 0)::BIGINT
             FROM user_usage
             WHERE user_id = $1 AND usage_date >= $3 AND usage_date < $4",
        )
        .bind(user_id)
        .bind(day.start_date())
        .bind(month.start_date())
        .bind(month.end_date())
        .fetch_one(pool)
        .await?;

        Ok(UsageSnapshot {
            daily_messages,
            monthly_tokens,
        })
    }
}
