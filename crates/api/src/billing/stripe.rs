//! Stripe REST client and webhook payloads.
//!
//! Checkout Sessions are created and subscriptions cancelled from here;
//! every other change to a Stripe subscription arrives through webhooks.

use std::collections::HashMap;

use innerai_core::plans::{BillingCycle, PlanType};
use innerai_core::subscription::{PaymentMethod, PaymentProvider};
use innerai_core::types::{DbId, Timestamp};
use serde::Deserialize;

use super::{error_from_response, CheckoutItem, CheckoutRequest, CheckoutSession, GatewayError};
use crate::config::BillingConfig;

/// Metadata keys shared by the checkout form and the webhook handler.
pub const META_USER_ID: &str = "userId";
pub const META_PLAN_ID: &str = "planId";
pub const META_BILLING_CYCLE: &str = "billingCycle";
pub const META_PACKAGE_ID: &str = "packageId";

pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    prices: HashMap<(PlanType, BillingCycle), String>,
    success_url: String,
    cancel_url: String,
}

impl StripeClient {
    /// `None` when `STRIPE_SECRET_KEY` is unset.
    pub fn new(client: reqwest::Client, config: &BillingConfig) -> Option<Self> {
        let secret_key = config.stripe_secret_key.clone()?;
        Some(Self {
            client,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key,
            prices: config.stripe_prices.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        })
    }

    /// POST /v1/checkout/sessions
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let price_id = match request.item {
            CheckoutItem::Plan { plan, cycle } => self.prices.get(&(plan, cycle)).map(String::as_str),
            CheckoutItem::Package(_) => None,
        };
        let form = checkout_form(request, price_id, &self.success_url, &self.cancel_url);

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let session: SessionCreated = response.json().await?;
        tracing::info!(
            user_id = request.user_id,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        Ok(CheckoutSession {
            provider: PaymentProvider::Stripe,
            id: session.id,
            url: session.url.unwrap_or_default(),
        })
    }

    /// DELETE /v1/subscriptions/{id} to end the subscription now, or
    /// POST /v1/subscriptions/{id} with `cancel_at_period_end=true`.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/v1/subscriptions/{subscription_id}", self.api_base);
        let request = if at_period_end {
            self.client
                .post(&url)
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.client.delete(&url)
        };

        let response = request.bearer_auth(&self.secret_key).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::info!(subscription_id, at_period_end, "Stripe subscription cancelled");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SessionCreated {
    id: String,
    url: Option<String>,
}

/// Form-encoded body for a Checkout Session.
///
/// Plans open a `subscription` session, packages a one-off `payment`
/// session. Without a configured `price_id` the price is sent inline.
pub fn checkout_form(
    request: &CheckoutRequest,
    price_id: Option<&str>,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = Vec::new();
    let mut push = |key: &str, value: String| form.push((key.to_string(), value));

    let user_id = request.user_id.to_string();
    let subscription = matches!(request.item, CheckoutItem::Plan { .. });

    let mode = if subscription { "subscription" } else { "payment" };
    push("mode", mode.into());
    push("success_url", success_url.to_string());
    push("cancel_url", cancel_url.to_string());
    push("customer_email", request.email.clone());
    push("client_reference_id", user_id.clone());
    if request.method == PaymentMethod::Card {
        push("payment_method_types[0]", "card".into());
    }

    push("line_items[0][quantity]", "1".into());
    match price_id {
        Some(price) => push("line_items[0][price]", price.to_string()),
        None => {
            push(
                "line_items[0][price_data][currency]",
                request.item.currency().to_ascii_lowercase(),
            );
            push(
                "line_items[0][price_data][unit_amount]",
                request.item.amount_cents().to_string(),
            );
            push("line_items[0][price_data][product_data][name]", request.item.title());
            if let CheckoutItem::Plan { cycle, .. } = request.item {
                let interval = match cycle {
                    BillingCycle::Monthly => "month",
                    BillingCycle::Yearly => "year",
                };
                push("line_items[0][price_data][recurring][interval]", interval.into());
            }
        }
    }

    push(&format!("metadata[{META_USER_ID}]"), user_id.clone());
    match request.item {
        CheckoutItem::Plan { plan, cycle } => {
            push(&format!("metadata[{META_PLAN_ID}]"), plan.as_str().into());
            push(&format!("metadata[{META_BILLING_CYCLE}]"), cycle.as_str().into());
            push(&format!("subscription_data[metadata][{META_USER_ID}]"), user_id);
            push(
                &format!("subscription_data[metadata][{META_PLAN_ID}]"),
                plan.as_str().into(),
            );
            push(
                &format!("subscription_data[metadata][{META_BILLING_CYCLE}]"),
                cycle.as_str().into(),
            );
        }
        CheckoutItem::Package(package) => {
            push(&format!("metadata[{META_PACKAGE_ID}]"), package.id.into());
        }
    }

    form
}

// ---------------------------------------------------------------------------
// Webhook payloads
// ---------------------------------------------------------------------------

/// Envelope of every Stripe webhook event.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// `data.object` of `checkout.session.*` events.
#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// `metadata.userId`, falling back to `client_reference_id`.
    pub fn user_id(&self) -> Option<DbId> {
        self.meta(META_USER_ID)
            .or(self.client_reference_id.as_deref())
            .and_then(|v| v.trim().parse().ok())
    }
}

/// `data.object` of `customer.subscription.*` events.
#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<i64>,
}

impl SubscriptionObject {
    pub fn period_end(&self) -> Option<Timestamp> {
        self.current_period_end
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }
}

#[cfg(test)]
mod tests {
    use innerai_core::credits::find_package;

    use super::*;

    fn request(item: CheckoutItem) -> CheckoutRequest {
        CheckoutRequest {
            user_id: 7,
            email: "ana@example.com".into(),
            item,
            method: PaymentMethod::Card,
            installments: None,
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn plan_checkout_is_a_subscription_with_inline_price() {
        let form = checkout_form(
            &request(CheckoutItem::Plan {
                plan: PlanType::Pro,
                cycle: BillingCycle::Monthly,
            }),
            None,
            "https://app/ok",
            "https://app/cancel",
        );
        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("4700"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("brl"));
        assert_eq!(
            value(&form, "line_items[0][price_data][recurring][interval]"),
            Some("month")
        );
        assert_eq!(value(&form, "metadata[userId]"), Some("7"));
        assert_eq!(value(&form, "metadata[planId]"), Some("PRO"));
        assert_eq!(value(&form, "subscription_data[metadata][billingCycle]"), Some("monthly"));
        assert_eq!(value(&form, "client_reference_id"), Some("7"));
    }

    #[test]
    fn configured_price_id_replaces_price_data() {
        let form = checkout_form(
            &request(CheckoutItem::Plan {
                plan: PlanType::Lite,
                cycle: BillingCycle::Yearly,
            }),
            Some("price_123"),
            "ok",
            "cancel",
        );
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_123"));
        assert!(value(&form, "line_items[0][price_data][unit_amount]").is_none());
    }

    #[test]
    fn package_checkout_is_a_one_off_payment() {
        let form = checkout_form(
            &request(CheckoutItem::Package(find_package("pkg_10k").unwrap())),
            None,
            "ok",
            "cancel",
        );
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "metadata[packageId]"), Some("pkg_10k"));
        assert!(value(&form, "metadata[planId]").is_none());
        assert!(value(&form, "line_items[0][price_data][recurring][interval]").is_none());
    }

    #[test]
    fn checkout_session_reads_user_from_metadata_or_reference() {
        let session: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "client_reference_id": "12",
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(session.user_id(), Some(12));

        let session: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_2",
            "client_reference_id": "12",
            "metadata": {"userId": "34"}
        }))
        .unwrap();
        assert_eq!(session.user_id(), Some(34));
    }

    #[test]
    fn subscription_period_end_is_unix_seconds() {
        let sub: SubscriptionObject = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "current_period_end": 1_767_225_600
        }))
        .unwrap();
        assert_eq!(sub.period_end().unwrap().timestamp(), 1_767_225_600);
        assert!(!sub.cancel_at_period_end);
    }
}
