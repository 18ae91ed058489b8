//! Completed provider payments.

use innerai_core::subscription::PaymentProvider;
use innerai_core::types::{Cents, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Payment bought a plan period.
pub const PURPOSE_SUBSCRIPTION: &str = "SUBSCRIPTION";
/// Payment bought a credit package.
pub const PURPOSE_CREDITS: &str = "CREDITS";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub user_id: DbId,
    pub provider: String,
    pub provider_payment_id: String,
    pub purpose: String,
    pub plan_type: Option<String>,
    pub package_id: Option<String>,
    pub amount_cents: Cents,
    pub currency: String,
    pub status: String,
    pub created_at: Timestamp,
}

/// DTO for recording a payment. `(provider, provider_payment_id)` is unique,
/// so recording the same payment twice is a no-op.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: DbId,
    pub provider: PaymentProvider,
    pub provider_payment_id: String,
    pub purpose: &'static str,
    pub plan_type: Option<String>,
    pub package_id: Option<String>,
    pub amount_cents: Cents,
    pub currency: String,
}
