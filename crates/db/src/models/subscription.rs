//! Subscription rows and DTOs.

use innerai_core::plans::{BillingCycle, PlanType};
use innerai_core::subscription::PaymentProvider;
use innerai_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: DbId,
    pub user_id: DbId,
    pub plan_type: String,
    pub status: String,
    pub billing_cycle: String,
    pub provider: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub mercadopago_payment_id: Option<String>,
    pub cancel_at_period_end: bool,
    pub started_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for activating a subscription.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: DbId,
    pub plan: PlanType,
    pub billing_cycle: BillingCycle,
    pub provider: PaymentProvider,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub mercadopago_payment_id: Option<String>,
    pub started_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// Result of expiring one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredSubscription {
    pub user_id: DbId,
    /// `false` when the user still holds another live subscription.
    pub downgraded: bool,
}
