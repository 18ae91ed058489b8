//! Per-plan usage limits: accounting windows, the allow/deny decision and
//! the usage summary returned to clients.
//!
//! All windows are computed in UTC. Usage rows are keyed by UTC calendar day.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::models;
use crate::plans::{PlanLimits, PlanType};
use crate::types::{Credits, Timestamp};

/// A half-open `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl UsageWindow {
    /// The UTC calendar day containing `now`.
    pub fn day(now: Timestamp) -> Self {
        let start = start_of_day(now.date_naive());
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// The UTC calendar month containing `now`.
    pub fn month(now: Timestamp) -> Self {
        let date = now.date_naive();
        let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
        let next_first = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
        }
        .unwrap_or(first);
        Self {
            start: start_of_day(first),
            end: start_of_day(next_first),
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

fn start_of_day(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitViolation {
    ModelNotAllowed { model: String, plan: PlanType },
    DailyMessages { used: i64, limit: i64 },
    MonthlyTokens { used: i64, limit: i64 },
}

impl LimitViolation {
    pub fn reason(&self) -> String {
        match self {
            LimitViolation::ModelNotAllowed { model, plan } => {
                format!("Model {model} is not available for {plan} plan")
            }
            LimitViolation::DailyMessages { used, limit } => {
                format!("Daily message limit reached ({used}/{limit})")
            }
            LimitViolation::MonthlyTokens { used, limit } => {
                format!("Monthly token limit reached ({used}/{limit})")
            }
        }
    }
}

impl From<LimitViolation> for CoreError {
    /// Model gating is an authorization failure; exhausted quotas are
    /// rate-limit failures.
    fn from(violation: LimitViolation) -> Self {
        match violation {
            LimitViolation::ModelNotAllowed { .. } => CoreError::Forbidden(violation.reason()),
            _ => CoreError::LimitExceeded(violation.reason()),
        }
    }
}

/// Aggregated usage the limit check needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub daily_messages: i64,
    pub monthly_tokens: i64,
}

/// Decide whether `plan` may send one more message to `model`.
///
/// Checks run in order: model access, daily messages, monthly tokens. A
/// counter that has reached its limit blocks the next request.
pub fn check_usage_limits(
    plan: PlanType,
    model: Option<&str>,
    usage: UsageSnapshot,
) -> Result<(), LimitViolation> {
    if let Some(model) = model {
        if !models::is_model_allowed(plan, model) {
            return Err(LimitViolation::ModelNotAllowed {
                model: model.to_string(),
                plan,
            });
        }
    }

    let limits = plan.limits();

    if let Some(limit) = limits.daily_messages {
        if usage.daily_messages >= limit {
            return Err(LimitViolation::DailyMessages {
                used: usage.daily_messages,
                limit,
            });
        }
    }

    if let Some(limit) = limits.monthly_tokens {
        if usage.monthly_tokens >= limit {
            return Err(LimitViolation::MonthlyTokens {
                used: usage.monthly_tokens,
                limit,
            });
        }
    }

    Ok(())
}

/// Remaining allowance, `None` when unlimited.
pub fn remaining(limit: Option<i64>, used: i64) -> Option<i64> {
    limit.map(|l| (l - used).max(0))
}

/// Summed usage counters over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub messages: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub credits: Credits,
}

impl UsageTotals {
    pub fn tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Allowance {
    pub used: i64,
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
}

impl Allowance {
    fn new(used: i64, limit: Option<i64>) -> Self {
        Self {
            used,
            limit,
            remaining: remaining(limit, used),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub messages: Allowance,
    pub credits: Credits,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyUsage {
    pub messages: i64,
    pub tokens: Allowance,
    pub credits: Credits,
}

/// Usage summary returned by `GET /usage/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub plan_type: PlanType,
    pub daily: DailyUsage,
    pub monthly: MonthlyUsage,
    pub models_allowed: Vec<&'static str>,
}

pub fn build_usage_stats(plan: PlanType, daily: UsageTotals, monthly: UsageTotals) -> UsageStats {
    let PlanLimits {
        daily_messages,
        monthly_tokens,
    } = plan.limits();

    UsageStats {
        plan_type: plan,
        daily: DailyUsage {
            messages: Allowance::new(daily.messages, daily_messages),
            credits: daily.credits,
        },
        monthly: MonthlyUsage {
            messages: monthly.messages,
            tokens: Allowance::new(monthly.tokens(), monthly_tokens),
            credits: monthly.credits,
        },
        models_allowed: models::models_for_plan(plan).map(|m| m.id).collect(),
    }
}
