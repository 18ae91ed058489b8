//! MercadoPago REST client and notification parsing.
//!
//! Pix and boleto checkouts are Checkout Pro preferences. Notifications only
//! carry a payment id; the payment itself is fetched before acting on it.

use std::collections::HashMap;

use innerai_core::subscription::{PaymentMethod, PaymentProvider};
use innerai_core::types::{Cents, DbId};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::{error_from_response, CheckoutItem, CheckoutRequest, CheckoutSession, GatewayError};
use crate::config::BillingConfig;

pub const META_USER_ID: &str = "user_id";
pub const META_PLAN_ID: &str = "plan_id";
pub const META_BILLING_CYCLE: &str = "billing_cycle";
pub const META_PACKAGE_ID: &str = "package_id";

const STATEMENT_DESCRIPTOR: &str = "InnerAI";

pub struct MercadoPagoClient {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
    notification_url: Option<String>,
    success_url: String,
    failure_url: String,
}

impl MercadoPagoClient {
    /// `None` when `MERCADOPAGO_ACCESS_TOKEN` is unset.
    pub fn new(client: reqwest::Client, config: &BillingConfig) -> Option<Self> {
        let access_token = config.mercadopago_access_token.clone()?;
        Some(Self {
            client,
            api_base: config.mercadopago_api_base.trim_end_matches('/').to_string(),
            access_token,
            notification_url: config.mercadopago_notification_url.clone(),
            success_url: config.checkout_success_url.clone(),
            failure_url: config.checkout_cancel_url.clone(),
        })
    }

    /// POST /checkout/preferences
    pub async fn create_preference(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = preference_body(
            request,
            self.notification_url.as_deref(),
            &self.success_url,
            &self.failure_url,
        );

        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let preference: PreferenceCreated = response.json().await?;
        tracing::info!(
            user_id = request.user_id,
            preference_id = %preference.id,
            "MercadoPago preference created"
        );

        Ok(CheckoutSession {
            provider: PaymentProvider::MercadoPago,
            id: preference.id,
            url: preference.init_point.unwrap_or_default(),
        })
    }

    /// GET /v1/payments/{id}
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<MercadoPagoPayment, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{payment_id}", self.api_base))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct PreferenceCreated {
    id: String,
    init_point: Option<String>,
}

/// JSON body for a Checkout Pro preference.
///
/// Payment types other than the chosen method are excluded so the hosted
/// page only offers Pix or boleto.
pub fn preference_body(
    request: &CheckoutRequest,
    notification_url: Option<&str>,
    success_url: &str,
    failure_url: &str,
) -> Value {
    let excluded: &[&str] = match request.method {
        PaymentMethod::Pix => &["credit_card", "debit_card", "ticket"],
        PaymentMethod::Boleto => &["credit_card", "debit_card", "bank_transfer"],
        PaymentMethod::Card => &["ticket", "bank_transfer"],
    };
    let installments = request.installments.unwrap_or(1).max(1);

    let mut metadata = json!({ META_USER_ID: request.user_id.to_string() });
    match request.item {
        CheckoutItem::Plan { plan, cycle } => {
            metadata[META_PLAN_ID] = json!(plan.as_str());
            metadata[META_BILLING_CYCLE] = json!(cycle.as_str());
        }
        CheckoutItem::Package(package) => {
            metadata[META_PACKAGE_ID] = json!(package.id);
        }
    }

    let mut body = json!({
        "items": [{
            "title": request.item.title(),
            "quantity": 1,
            "currency_id": request.item.currency(),
            "unit_price": request.item.amount_cents() as f64 / 100.0,
        }],
        "payer": { "email": request.email },
        "payment_methods": {
            "excluded_payment_types": excluded.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
            "installments": installments,
            "default_installments": installments,
        },
        "back_urls": {
            "success": success_url,
            "failure": failure_url,
            "pending": success_url,
        },
        "auto_return": "approved",
        "statement_descriptor": STATEMENT_DESCRIPTOR,
        "external_reference": request.user_id.to_string(),
        "metadata": metadata,
    });
    if let Some(url) = notification_url {
        body["notification_url"] = json!(url);
    }
    body
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// The fields of a MercadoPago payment the webhook handler uses.
#[derive(Debug, Clone, Deserialize)]
pub struct MercadoPagoPayment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// `approved`, `pending`, `in_process`, `rejected`, `cancelled`, ...
    pub status: String,
    pub external_reference: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub transaction_amount: Option<f64>,
    pub currency_id: Option<String>,
}

impl MercadoPagoPayment {
    /// Metadata value as a string; MercadoPago may echo ids back as numbers.
    pub fn meta(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Owner of the payment: `external_reference`, then `metadata.user_id`.
    pub fn user_id(&self) -> Option<DbId> {
        self.external_reference
            .as_deref()
            .and_then(parse_external_reference)
            .or_else(|| self.meta(META_USER_ID).and_then(|v| v.trim().parse().ok()))
    }

    pub fn amount_cents(&self) -> Cents {
        self.transaction_amount
            .map(|amount| (amount * 100.0).round() as Cents)
            .unwrap_or(0)
    }
}

/// Read the user id from an external reference: either the bare id or a
/// JSON object with a `userId` field.
pub fn parse_external_reference(reference: &str) -> Option<DbId> {
    let reference = reference.trim();
    if let Ok(id) = reference.parse() {
        return Some(id);
    }
    let value: Value = serde_json::from_str(reference).ok()?;
    match value.get("userId")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// What a notification points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// `payment`, `merchant_order`, ...
    pub topic: String,
    pub data_id: String,
}

impl Notification {
    pub fn is_payment(&self) -> bool {
        self.topic == "payment"
    }
}

/// Parse a notification from its JSON body, falling back to the query
/// string.
///
/// Accepts the webhook shape `{"type": "payment", "data": {"id": ...}}` and
/// the IPN shape `{"topic": "payment", "id": ...}`, and the query forms
/// `?type=payment&data.id=...` / `?topic=payment&id=...`.
pub fn parse_notification(body: &Value, query: &HashMap<String, String>) -> Option<Notification> {
    let topic = str_field(body, "type")
        .or_else(|| str_field(body, "topic"))
        .or_else(|| query.get("type").cloned())
        .or_else(|| query.get("topic").cloned())?;

    let data_id = body
        .get("data")
        .and_then(|d| id_value(d.get("id")?))
        .or_else(|| body.get("id").and_then(id_value))
        .or_else(|| query.get("data.id").cloned())
        .or_else(|| query.get("id").cloned())
        .filter(|id| !id.is_empty())?;

    Some(Notification { topic, data_id })
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
