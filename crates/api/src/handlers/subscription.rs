//! Handlers for the caller's subscription.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use innerai_core::plans::PlanType;
use innerai_core::subscription::PaymentProvider;
use innerai_db::models::subscription::Subscription;
use innerai_db::repositories::SubscriptionRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::query::CancelParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub plan_type: PlanType,
    /// Newest ACTIVE subscription; `null` on the free plan.
    pub subscription: Option<Subscription>,
}

/// GET /api/v1/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<SubscriptionResponse>>> {
    let user = load_user(&state, auth.user_id).await?;
    let subscription = SubscriptionRepo::find_active_for_user(&state.pool, user.id).await?;

    Ok(Json(DataResponse {
        data: SubscriptionResponse {
            plan_type: user.plan(),
            subscription,
        },
    }))
}

/// Stop the provider from billing `subscription` again.
///
/// Runs before the local row changes: a Stripe subscription left running
/// would renew and its next `customer.subscription.updated` event would
/// revive the cancelled row. MercadoPago and manual subscriptions are paid
/// once per period and need no provider call.
pub(crate) async fn cancel_with_provider(
    state: &AppState,
    subscription: &Subscription,
    at_period_end: bool,
) -> AppResult<()> {
    if subscription.provider != PaymentProvider::Stripe.as_str() {
        return Ok(());
    }
    let Some(stripe_id) = subscription.stripe_subscription_id.as_deref() else {
        tracing::warn!(
            subscription_id = subscription.id,
            "Stripe subscription has no provider id, cancelling locally only"
        );
        return Ok(());
    };

    state
        .gateway
        .cancel_subscription(stripe_id, at_period_end)
        .await
        .map_err(|e| {
            tracing::error!(
                subscription_id = subscription.id,
                stripe_subscription_id = stripe_id,
                error = %e,
                "Stripe refused the cancellation"
            );
            AppError::from(e)
        })
}

/// DELETE /api/v1/subscription?at_period_end=
///
/// Without `at_period_end` the subscription ends now and the user drops to
/// FREE. With it, access continues until `expires_at`. Stripe subscriptions
/// are cancelled on Stripe first; a provider failure leaves the local row
/// untouched.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<CancelParams>,
) -> AppResult<Json<DataResponse<SubscriptionResponse>>> {
    let active = SubscriptionRepo::find_active_for_user(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".into()))?;

    cancel_with_provider(&state, &active, params.at_period_end).await?;

    let updated = if params.at_period_end {
        SubscriptionRepo::schedule_cancel(&state.pool, active.id).await?
    } else {
        SubscriptionRepo::cancel_now(&state.pool, active.id, Utc::now()).await?
    };
    // Lost a race with a webhook or the expiry job.
    let updated = updated.ok_or_else(|| AppError::NotFound("No active subscription".into()))?;

    tracing::info!(
        user_id = auth.user_id,
        subscription_id = updated.id,
        at_period_end = params.at_period_end,
        "Subscription cancelled"
    );

    let user = load_user(&state, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: SubscriptionResponse {
            plan_type: user.plan(),
            subscription: Some(updated),
        },
    }))
}
