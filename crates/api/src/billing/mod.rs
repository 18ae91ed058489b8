//! Payment providers.
//!
//! [`PaymentGateway`] is the seam between handlers and the outside world:
//! production uses [`gateway::HttpPaymentGateway`], tests substitute a stub.
//!
//! - [`stripe`] -- Checkout Sessions for card payments, subscription
//!   cancellation, webhook event shapes.
//! - [`mercadopago`] -- preferences for Pix / boleto, payment lookups,
//!   notification parsing.
//! - [`webhooks`] -- applies verified provider events to the database.

pub mod gateway;
pub mod mercadopago;
pub mod stripe;
pub mod webhooks;

use async_trait::async_trait;
use innerai_core::credits::CreditPackage;
use innerai_core::plans::{BillingCycle, PlanType, BILLING_CURRENCY};
use innerai_core::subscription::{PaymentMethod, PaymentProvider};
use innerai_core::types::{Cents, DbId};
use serde::Serialize;

pub use mercadopago::MercadoPagoPayment;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The provider's credentials are not set.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Network, DNS, timeout or body decoding failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("Provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

/// Turn a non-2xx provider response into [`GatewayError::Api`], keeping the
/// provider's own error message when the body carries one.
pub(crate) async fn error_from_response(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    GatewayError::Api { status, message }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// What the customer is paying for.
#[derive(Debug, Clone, Copy)]
pub enum CheckoutItem {
    Plan { plan: PlanType, cycle: BillingCycle },
    Package(&'static CreditPackage),
}

impl CheckoutItem {
    pub fn amount_cents(&self) -> Cents {
        match self {
            CheckoutItem::Plan { plan, cycle } => plan.price(*cycle).unwrap_or(0),
            CheckoutItem::Package(package) => package.price_cents,
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            CheckoutItem::Plan { .. } => BILLING_CURRENCY,
            CheckoutItem::Package(package) => package.currency,
        }
    }

    /// Line-item title shown on the provider's checkout page.
    pub fn title(&self) -> String {
        match self {
            CheckoutItem::Plan { plan, cycle } => {
                format!("InnerAI {plan} ({})", cycle.as_str())
            }
            CheckoutItem::Package(package) => format!("InnerAI {}", package.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: DbId,
    pub email: String,
    pub item: CheckoutItem,
    pub method: PaymentMethod,
    /// Card installments offered on MercadoPago checkouts.
    pub installments: Option<u32>,
}

/// A provider-hosted checkout the client is redirected to.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub provider: PaymentProvider,
    /// Stripe session id or MercadoPago preference id.
    pub id: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout with the provider that handles `request.method`.
    async fn create_checkout(&self, request: &CheckoutRequest)
        -> Result<CheckoutSession, GatewayError>;

    /// Load a MercadoPago payment named by a notification.
    async fn fetch_mercadopago_payment(
        &self,
        payment_id: &str,
    ) -> Result<MercadoPagoPayment, GatewayError>;

    /// Stop a Stripe subscription from billing again, either now or at the
    /// end of the current period.
    async fn cancel_subscription(
        &self,
        stripe_subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), GatewayError>;
}
