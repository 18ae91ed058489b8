//! Handlers for the caller's usage counters.

use axum::extract::State;
use axum::Json;
use chrono::{NaiveDate, Utc};
use innerai_core::plans::PlanType;
use innerai_core::types::Credits;
use innerai_core::usage::{build_usage_stats, remaining, UsageStats, UsageWindow};
use innerai_db::models::usage::UserUsage;
use innerai_db::repositories::UsageRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TodayUsage {
    pub date: NaiveDate,
    pub plan_type: PlanType,
    pub messages_used: i64,
    /// `null` when unlimited.
    pub daily_limit: Option<i64>,
    pub remaining: Option<i64>,
    pub credits_charged: Credits,
    pub by_model: Vec<UserUsage>,
}

/// GET /api/v1/usage/today
pub async fn today(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<TodayUsage>>> {
    let user = load_user(&state, auth.user_id).await?;
    let plan = user.plan();
    let date = UsageWindow::day(Utc::now()).start_date();

    let by_model = UsageRepo::list_for_day(&state.pool, user.id, date).await?;
    let messages_used = by_model.iter().map(|u| u.messages_count).sum();
    let credits_charged = by_model.iter().map(|u| u.credits_charged).sum();
    let daily_limit = plan.limits().daily_messages;

    Ok(Json(DataResponse {
        data: TodayUsage {
            date,
            plan_type: plan,
            messages_used,
            daily_limit,
            remaining: remaining(daily_limit, messages_used),
            credits_charged,
            by_model,
        },
    }))
}

/// GET /api/v1/usage/stats
///
/// Today's and this month's counters against the plan's limits.
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<UsageStats>>> {
    let user = load_user(&state, auth.user_id).await?;
    let now = Utc::now();

    let daily = UsageRepo::totals(&state.pool, user.id, &UsageWindow::day(now)).await?;
    let monthly = UsageRepo::totals(&state.pool, user.id, &UsageWindow::month(now)).await?;

    Ok(Json(DataResponse {
        data: build_usage_stats(user.plan(), daily.into(), monthly.into()),
    }))
}
