//! Admin-only handlers: user management, manual credits and plans, and the
//! expiry job trigger.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use innerai_core::credits::TransactionKind;
use innerai_core::error::CoreError;
use innerai_core::plans::{BillingCycle, PlanType};
use innerai_core::subscription::{expiry_from, PaymentProvider};
use innerai_core::types::{Credits, DbId};
use innerai_db::models::credit_transaction::{CreditTransaction, LedgerNote};
use innerai_db::models::subscription::NewSubscription;
use innerai_db::models::user::UserResponse;
use innerai_db::repositories::{CreditRepo, SessionRepo, SubscriptionRepo, UserRepo};
use serde::Deserialize;

use crate::background::subscription_expiry::{self, ExpiryReport};
use crate::error::{AppError, AppResult};
use crate::handlers::subscription::cancel_with_provider;
use crate::handlers::users::load_user;
use crate::middleware::rbac::RequireAdmin;
use crate::query::PaginationParams;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustCreditsRequest {
    /// Positive grants a bonus; negative removes credits.
    pub amount: Credits,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPlanRequest {
    pub plan: String,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/users?limit=&offset=
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Page<UserResponse>>>> {
    let (limit, offset) = (params.limit(), params.offset());
    let users = UserRepo::list(&state.pool, limit, offset).await?;
    let total = UserRepo::count(&state.pool).await?;

    Ok(Json(DataResponse {
        data: Page {
            items: users.iter().map(UserResponse::from).collect(),
            total,
            limit,
            offset,
        },
    }))
}

/// POST /api/v1/admin/users/{id}/credits
///
/// A negative amount is an ADJUSTMENT debit and may not overdraw.
pub async fn adjust_credits(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
    Json(input): Json<AdjustCreditsRequest>,
) -> AppResult<Json<DataResponse<CreditTransaction>>> {
    if input.amount == 0 {
        return Err(AppError::Core(CoreError::Validation(
            "Amount must not be zero".into(),
        )));
    }

    let description = input
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "Admin adjustment".to_string());
    let note = LedgerNote::new(description).with_reference("admin", admin.user_id.to_string());

    let entry = if input.amount > 0 {
        CreditRepo::grant(&state.pool, user_id, input.amount, TransactionKind::Bonus, &note).await?
    } else {
        let amount = input.amount.checked_neg().ok_or_else(|| {
            AppError::Core(CoreError::Validation("Amount is out of range".into()))
        })?;
        CreditRepo::debit(&state.pool, user_id, amount, TransactionKind::Adjustment, &note).await?
    };

    tracing::info!(
        admin_id = admin.user_id,
        user_id,
        amount = input.amount,
        balance_after = entry.balance_after,
        "Credits adjusted by admin"
    );

    Ok(Json(DataResponse { data: entry }))
}

/// PUT /api/v1/admin/users/{id}/plan
///
/// A paid plan becomes a MANUAL subscription for one billing period; FREE
/// cancels every active subscription. A live Stripe subscription is
/// cancelled on Stripe first so it stops billing.
pub async fn set_plan(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
    Json(input): Json<SetPlanRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let plan: PlanType = input.plan.parse()?;
    load_user(&state, user_id).await?;
    let now = Utc::now();

    if let Some(current) = SubscriptionRepo::find_active_for_user(&state.pool, user_id).await? {
        cancel_with_provider(&state, &current, false).await?;
    }

    if plan.is_paid() {
        let subscription = NewSubscription {
            user_id,
            plan,
            billing_cycle: input.billing_cycle,
            provider: PaymentProvider::Manual,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            mercadopago_payment_id: None,
            started_at: now,
            expires_at: Some(expiry_from(now, input.billing_cycle)),
        };
        SubscriptionRepo::activate(&state.pool, &subscription, None).await?;
    } else {
        SubscriptionRepo::cancel_all_for_user(&state.pool, user_id, now).await?;
    }

    tracing::info!(admin_id = admin.user_id, user_id, plan = %plan, "Plan set by admin");

    let user = load_user(&state, user_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/v1/admin/users/{id}/active
///
/// Deactivating also revokes the user's sessions.
pub async fn set_active(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
    Json(input): Json<SetActiveRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    if !UserRepo::set_active(&state.pool, user_id, input.is_active).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }));
    }
    if !input.is_active {
        SessionRepo::revoke_all_for_user(&state.pool, user_id).await?;
    }

    tracing::info!(admin_id = admin.user_id, user_id, is_active = input.is_active, "User activation changed");

    let user = load_user(&state, user_id).await?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// POST /api/v1/admin/subscriptions/expire
///
/// Run the expiry pass now and return its report.
pub async fn expire_subscriptions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> AppResult<Json<DataResponse<ExpiryReport>>> {
    let report = subscription_expiry::run_once(&state.pool, Utc::now()).await?;
    tracing::info!(
        admin_id = admin.user_id,
        expired = report.expired,
        downgraded = report.downgraded,
        "Expiry pass triggered by admin"
    );
    Ok(Json(DataResponse { data: report }))
}
