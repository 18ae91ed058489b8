//! Handlers for plan checkout and payment history.

use axum::extract::{Query, State};
use axum::Json;
use innerai_core::plans::{BillingCycle, PlanType};
use innerai_core::subscription::PaymentMethod;
use innerai_db::models::payment::Payment;
use innerai_db::repositories::PaymentRepo;
use serde::Deserialize;

use crate::billing::{CheckoutItem, CheckoutRequest, CheckoutSession};
use crate::error::{AppError, AppResult};
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    /// Plan name, case-insensitive.
    pub plan: String,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    pub payment_method: PaymentMethod,
    pub installments: Option<u32>,
}

/// POST /api/v1/billing/checkout
///
/// Card payments open a Stripe subscription checkout; Pix and boleto open a
/// MercadoPago preference for one billing period.
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CheckoutInput>,
) -> AppResult<Json<DataResponse<CheckoutSession>>> {
    let plan: PlanType = input.plan.parse()?;
    if !plan.is_paid() {
        return Err(AppError::BadRequest(
            "The FREE plan does not need a checkout".into(),
        ));
    }
    let user = load_user(&state, auth.user_id).await?;

    let request = CheckoutRequest {
        user_id: user.id,
        email: user.email,
        item: CheckoutItem::Plan {
            plan,
            cycle: input.billing_cycle,
        },
        method: input.payment_method,
        installments: input.installments,
    };
    let session = state.gateway.create_checkout(&request).await?;

    tracing::info!(
        user_id = request.user_id,
        plan = %plan,
        cycle = input.billing_cycle.as_str(),
        provider = %session.provider,
        "Plan checkout opened"
    );

    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/billing/payments?limit=&offset=
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Payment>>>> {
    let payments =
        PaymentRepo::list_for_user(&state.pool, auth.user_id, params.limit(), params.offset())
            .await?;
    Ok(Json(DataResponse { data: payments }))
}
