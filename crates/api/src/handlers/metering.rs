//! Metering: the pre-flight limit check and the per-completion charge.
//!
//! Chat and tool services call these after authenticating the end user;
//! the caller's bearer token identifies whose plan and balance are used.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use innerai_core::credits::{credits_for_tokens, is_low_balance};
use innerai_core::error::CoreError;
use innerai_core::models::{find_model, find_tool, is_model_allowed, ModelInfo};
use innerai_core::plans::PlanType;
use innerai_core::types::Credits;
use innerai_core::usage::{check_usage_limits, remaining, LimitViolation, UsageWindow};
use innerai_db::models::credit_transaction::LedgerNote;
use innerai_db::models::usage::{RecordUsage, UserUsage};
use innerai_db::repositories::{CreditRepo, UsageRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    pub model: String,
    pub plan_type: PlanType,
    pub daily_messages_used: i64,
    pub daily_messages_remaining: Option<i64>,
    pub monthly_tokens_used: i64,
    pub monthly_tokens_remaining: Option<i64>,
    pub balance: Credits,
}

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    /// Caller's id for the completion (message id, request id, ...).
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    pub credits_charged: Credits,
    pub balance: Credits,
    pub is_low_balance: bool,
    /// Today's counters for the model after this charge.
    pub usage: UserUsage,
}

#[derive(Debug, Serialize)]
pub struct ToolChargeResponse {
    pub tool_id: &'static str,
    pub credits_charged: Credits,
    pub balance: Credits,
    pub is_low_balance: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/metering/authorize
///
/// 403 when the plan does not include the model, 429 when the daily message
/// or monthly token limit is used up.
pub async fn authorize(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<AuthorizeRequest>,
) -> AppResult<Json<DataResponse<AuthorizeResponse>>> {
    let model = known_model(&input.model)?;
    let user = load_user(&state, auth.user_id).await?;
    let plan = user.plan();

    let now = Utc::now();
    let usage = UsageRepo::snapshot(
        &state.pool,
        user.id,
        &UsageWindow::day(now),
        &UsageWindow::month(now),
    )
    .await?;

    if let Err(violation) = check_usage_limits(plan, Some(model.id), usage) {
        tracing::info!(user_id = user.id, reason = %violation.reason(), "Usage refused");
        return Err(AppError::Core(violation.into()));
    }

    let limits = plan.limits();
    Ok(Json(DataResponse {
        data: AuthorizeResponse {
            allowed: true,
            model: model.id.to_string(),
            plan_type: plan,
            daily_messages_used: usage.daily_messages,
            daily_messages_remaining: remaining(limits.daily_messages, usage.daily_messages),
            monthly_tokens_used: usage.monthly_tokens,
            monthly_tokens_remaining: remaining(limits.monthly_tokens, usage.monthly_tokens),
            balance: user.credit_balance,
        },
    }))
}

/// POST /api/v1/metering/charge
///
/// Debit the completion's token cost and count it against today's usage in
/// one transaction. 402 leaves both the balance and the counters untouched.
pub async fn charge(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ChargeRequest>,
) -> AppResult<Json<DataResponse<ChargeResponse>>> {
    if input.input_tokens < 0 || input.output_tokens < 0 {
        return Err(AppError::Core(CoreError::Validation(
            "Token counts must not be negative".into(),
        )));
    }
    let model = known_model(&input.model)?;
    let user = load_user(&state, auth.user_id).await?;
    let plan = user.plan();

    if !is_model_allowed(plan, model.id) {
        return Err(AppError::Core(
            LimitViolation::ModelNotAllowed {
                model: model.id.to_string(),
                plan,
            }
            .into(),
        ));
    }

    let credits = credits_for_tokens(model, input.input_tokens, input.output_tokens);
    let mut note = LedgerNote::new(format!(
        "{}: {} input + {} output tokens",
        model.name, input.input_tokens, input.output_tokens
    ));
    if let Some(reference) = input.reference_id.filter(|r| !r.is_empty()) {
        note = note.with_reference("completion", reference);
    }

    let record = RecordUsage {
        user_id: user.id,
        model_id: model.id.to_string(),
        usage_date: UsageWindow::day(Utc::now()).start_date(),
        input_tokens: input.input_tokens,
        output_tokens: input.output_tokens,
        credits,
        note,
    };
    let charge = UsageRepo::record_with_charge(&state.pool, &record).await?;

    tracing::debug!(
        user_id = user.id,
        model = model.id,
        credits,
        balance = charge.balance_after,
        "Completion charged"
    );

    Ok(Json(DataResponse {
        data: ChargeResponse {
            credits_charged: charge.credits_charged,
            balance: charge.balance_after,
            is_low_balance: is_low_balance(charge.balance_after, state.config.low_balance_threshold),
            usage: charge.usage,
        },
    }))
}

/// POST /api/v1/metering/tools/{tool_id}
///
/// Debit the tool's flat price.
pub async fn charge_tool(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tool_id): Path<String>,
) -> AppResult<Json<DataResponse<ToolChargeResponse>>> {
    let tool = find_tool(&tool_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown tool: '{tool_id}'")))?;
    let user = load_user(&state, auth.user_id).await?;
    let plan = user.plan();

    if plan.rank() < tool.min_plan.rank() {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Tool {} is not available for {plan} plan",
            tool.id
        ))));
    }

    let note = LedgerNote::new(tool.name).with_reference("tool", tool.id);
    let entry = CreditRepo::consume(&state.pool, user.id, tool.credits_per_use, &note).await?;

    Ok(Json(DataResponse {
        data: ToolChargeResponse {
            tool_id: tool.id,
            credits_charged: tool.credits_per_use,
            balance: entry.balance_after,
            is_low_balance: is_low_balance(entry.balance_after, state.config.low_balance_threshold),
        },
    }))
}

fn known_model(model_id: &str) -> AppResult<&'static ModelInfo> {
    find_model(model_id).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!("Unknown model: '{model_id}'")))
    })
}
