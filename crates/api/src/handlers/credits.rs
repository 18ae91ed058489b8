//! Handlers for the caller's credit balance and ledger.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use innerai_core::credits::{find_package, is_low_balance};
use innerai_core::error::CoreError;
use innerai_core::subscription::PaymentMethod;
use innerai_core::types::Credits;
use innerai_core::usage::UsageWindow;
use innerai_db::models::credit_transaction::{CreditTotals, CreditTransaction};
use innerai_db::repositories::CreditRepo;
use serde::{Deserialize, Serialize};

use crate::billing::{CheckoutItem, CheckoutRequest, CheckoutSession};
use crate::error::{AppError, AppResult};
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Credits,
    pub is_low_balance: bool,
    pub low_balance_threshold: Credits,
}

#[derive(Debug, Serialize)]
pub struct CreditStats {
    pub balance: Credits,
    pub this_month: CreditTotals,
    pub lifetime: CreditTotals,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: String,
    pub payment_method: PaymentMethod,
    pub installments: Option<u32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/credits/balance
pub async fn balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<BalanceResponse>>> {
    let balance = CreditRepo::balance(&state.pool, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }))?;
    let threshold = state.config.low_balance_threshold;

    Ok(Json(DataResponse {
        data: BalanceResponse {
            balance,
            is_low_balance: is_low_balance(balance, threshold),
            low_balance_threshold: threshold,
        },
    }))
}

/// GET /api/v1/credits/history?limit=&offset=
///
/// Ledger rows, newest first.
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Page<CreditTransaction>>>> {
    let (limit, offset) = (params.limit(), params.offset());
    let items = CreditRepo::history(&state.pool, auth.user_id, limit, offset).await?;
    let total = CreditRepo::count_history(&state.pool, auth.user_id).await?;

    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/v1/credits/stats
///
/// Consumed and purchased credits for the current UTC month and overall.
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<CreditStats>>> {
    let user = load_user(&state, auth.user_id).await?;
    let month = UsageWindow::month(Utc::now());

    let this_month =
        CreditRepo::totals(&state.pool, user.id, Some(month.start), Some(month.end)).await?;
    let lifetime = CreditRepo::totals(&state.pool, user.id, None, None).await?;

    Ok(Json(DataResponse {
        data: CreditStats {
            balance: user.credit_balance,
            this_month,
            lifetime,
        },
    }))
}

/// POST /api/v1/credits/purchase
///
/// Opens a provider checkout for a credit package. Credits are granted by
/// the payment webhook, not here.
pub async fn purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<PurchaseRequest>,
) -> AppResult<Json<DataResponse<CheckoutSession>>> {
    let package = find_package(&input.package_id).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "Unknown credit package: '{}'",
            input.package_id
        )))
    })?;
    let user = load_user(&state, auth.user_id).await?;

    let request = CheckoutRequest {
        user_id: user.id,
        email: user.email,
        item: CheckoutItem::Package(package),
        method: input.payment_method,
        installments: input.installments,
    };
    let session = state.gateway.create_checkout(&request).await?;

    tracing::info!(
        user_id = request.user_id,
        package_id = package.id,
        provider = %session.provider,
        "Credit package checkout opened"
    );

    Ok(Json(DataResponse { data: session }))
}
