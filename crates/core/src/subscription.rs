//! Subscription state: statuses, providers, period arithmetic and the
//! mapping from payment-provider states onto internal statuses.

use std::fmt;
use std::str::FromStr;

use chrono::Months;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::plans::BillingCycle;
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::PastDue => "PAST_DUE",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Expired => "EXPIRED",
        }
    }

    /// Only an active subscription grants its plan.
    pub fn grants_access(self) -> bool {
        self == SubscriptionStatus::Active
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "PAST_DUE" => Ok(SubscriptionStatus::PastDue),
            "CANCELLED" => Ok(SubscriptionStatus::Cancelled),
            "EXPIRED" => Ok(SubscriptionStatus::Expired),
            other => Err(CoreError::Validation(format!(
                "Unknown subscription status: '{other}'"
            ))),
        }
    }
}

/// Who collected the money for a subscription or payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Stripe,
    MercadoPago,
    /// Granted by an administrator, no payment involved.
    Manual,
}

impl PaymentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "STRIPE",
            PaymentProvider::MercadoPago => "MERCADO_PAGO",
            PaymentProvider::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method picked at checkout. Cards go through Stripe; Pix and
/// boleto go through MercadoPago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Pix,
    Boleto,
}

impl PaymentMethod {
    pub fn provider(self) -> PaymentProvider {
        match self {
            PaymentMethod::Card => PaymentProvider::Stripe,
            PaymentMethod::Pix | PaymentMethod::Boleto => PaymentProvider::MercadoPago,
        }
    }
}

/// End of the first period of a subscription starting at `start`.
///
/// Uses calendar arithmetic clamped to the end of the month, so Jan 31 plus
/// one month is the last day of February.
pub fn expiry_from(start: Timestamp, cycle: BillingCycle) -> Timestamp {
    let months = match cycle {
        BillingCycle::Monthly => Months::new(1),
        BillingCycle::Yearly => Months::new(12),
    };
    start.checked_add_months(months).unwrap_or(start)
}

/// Map a Stripe subscription status string onto an internal status.
pub fn map_stripe_status(status: &str) -> SubscriptionStatus {
    match status {
        "active" | "trialing" => SubscriptionStatus::Active,
        "past_due" => SubscriptionStatus::PastDue,
        _ => SubscriptionStatus::Cancelled,
    }
}

/// Outcome of applying a `customer.subscription.updated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
    pub expires_at: Option<Timestamp>,
    pub cancel_at_period_end: bool,
}

/// Resolve a Stripe subscription update.
///
/// A subscription flagged to cancel at period end that is still `active`
/// keeps access until `current_period_end`.
pub fn resolve_stripe_update(
    status: &str,
    cancel_at_period_end: bool,
    current_period_end: Option<Timestamp>,
) -> SubscriptionUpdate {
    let mapped = map_stripe_status(status);
    let pending_cancel = cancel_at_period_end && status == "active";
    SubscriptionUpdate {
        status: if pending_cancel {
            SubscriptionStatus::Active
        } else {
            mapped
        },
        expires_at: current_period_end,
        cancel_at_period_end: pending_cancel,
    }
}

/// Map a MercadoPago payment status. `None` means the status carries no
/// subscription transition (pending, in process, ...).
pub fn map_mercadopago_status(status: &str) -> Option<SubscriptionStatus> {
    match status {
        "approved" => Some(SubscriptionStatus::Active),
        "cancelled" | "rejected" | "failed" => Some(SubscriptionStatus::Cancelled),
        _ => None,
    }
}
