//! Production [`PaymentGateway`] over the providers' REST APIs.

use std::time::Duration;

use async_trait::async_trait;
use innerai_core::subscription::PaymentProvider;

use super::mercadopago::{MercadoPagoClient, MercadoPagoPayment};
use super::stripe::StripeClient;
use super::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
use crate::config::BillingConfig;

/// Timeout for a single provider request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes checkouts by payment method: cards to Stripe, Pix and boleto to
/// MercadoPago. A provider without credentials answers
/// [`GatewayError::NotConfigured`].
pub struct HttpPaymentGateway {
    stripe: Option<StripeClient>,
    mercadopago: Option<MercadoPagoClient>,
}

impl HttpPaymentGateway {
    pub fn new(config: &BillingConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let stripe = StripeClient::new(client.clone(), config);
        let mercadopago = MercadoPagoClient::new(client, config);
        if stripe.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set, card checkouts are disabled");
        }
        if mercadopago.is_none() {
            tracing::warn!("MERCADOPAGO_ACCESS_TOKEN not set, Pix and boleto checkouts are disabled");
        }

        Ok(Self {
            stripe,
            mercadopago,
        })
    }

    fn stripe(&self) -> Result<&StripeClient, GatewayError> {
        self.stripe
            .as_ref()
            .ok_or(GatewayError::NotConfigured("Stripe"))
    }

    fn mercadopago(&self) -> Result<&MercadoPagoClient, GatewayError> {
        self.mercadopago
            .as_ref()
            .ok_or(GatewayError::NotConfigured("MercadoPago"))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        match request.method.provider() {
            PaymentProvider::Stripe => self.stripe()?.create_checkout_session(request).await,
            PaymentProvider::MercadoPago | PaymentProvider::Manual => {
                self.mercadopago()?.create_preference(request).await
            }
        }
    }

    async fn fetch_mercadopago_payment(
        &self,
        payment_id: &str,
    ) -> Result<MercadoPagoPayment, GatewayError> {
        self.mercadopago()?.fetch_payment(payment_id).await
    }

    async fn cancel_subscription(
        &self,
        stripe_subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), GatewayError> {
        self.stripe()?
            .cancel_subscription(stripe_subscription_id, at_period_end)
            .await
    }
}
