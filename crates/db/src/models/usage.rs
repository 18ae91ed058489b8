//! Per-day usage counters.

use chrono::NaiveDate;
use innerai_core::types::{Credits, DbId};
use innerai_core::usage::UsageTotals;
use serde::Serialize;
use sqlx::FromRow;

use crate::models::credit_transaction::LedgerNote;

/// A row from `user_usage`: one per (user, model, UTC day).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserUsage {
    pub id: DbId,
    pub user_id: DbId,
    pub model_id: String,
    pub usage_date: NaiveDate,
    pub messages_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub credits_charged: Credits,
}

/// One metered completion to record.
#[derive(Debug, Clone)]
pub struct RecordUsage {
    pub user_id: DbId,
    pub model_id: String,
    pub usage_date: NaiveDate,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub credits: Credits,
    pub note: LedgerNote,
}

/// What a recorded completion cost.
#[derive(Debug, Clone)]
pub struct UsageCharge {
    pub usage: UserUsage,
    pub credits_charged: Credits,
    pub balance_after: Credits,
}

/// Summed counters over a date range.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct UsageAggregate {
    pub messages: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub credits: Credits,
}

impl From<UsageAggregate> for UsageTotals {
    fn from(row: UsageAggregate) -> Self {
        UsageTotals {
            messages: row.messages,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            credits: row.credits,
        }
    }
}
