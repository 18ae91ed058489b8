//! Payment provider webhooks.
//!
//! Both endpoints read the raw body so signatures are checked against the
//! exact bytes the provider signed.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use innerai_core::error::CoreError;
use innerai_core::signature::{verify_mercadopago, verify_stripe, SignatureError};
use innerai_core::subscription::PaymentProvider;
use innerai_db::repositories::WebhookEventRepo;
use serde::Serialize;
use serde_json::Value;

use crate::billing::mercadopago::parse_notification;
use crate::billing::stripe::StripeEvent;
use crate::billing::webhooks::{handle_mercadopago_payment, handle_stripe_event};
use crate::billing::GatewayError;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const MERCADOPAGO_SIGNATURE_HEADER: &str = "x-signature";
pub const MERCADOPAGO_REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

const ACK: WebhookAck = WebhookAck { received: true };

/// POST /api/v1/webhooks/stripe
///
/// Each event id is processed once. A failed attempt releases the id so
/// Stripe's retry runs it again.
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::BadRequest("Webhook body is not valid UTF-8".into()))?;

    let billing = &state.config.billing;
    match billing.stripe_webhook_secret.as_deref() {
        Some(secret) => verify_stripe(
            header(&headers, STRIPE_SIGNATURE_HEADER),
            payload,
            secret,
            billing.webhook_tolerance_secs,
            Utc::now(),
        )
        .map_err(signature_rejected)?,
        None if billing.allow_unsigned_webhooks => {
            tracing::warn!("Accepting unsigned Stripe webhook");
        }
        None => return Err(GatewayError::NotConfigured("Stripe").into()),
    }

    let event: StripeEvent = serde_json::from_str(payload)
        .map_err(|e| AppError::BadRequest(format!("Malformed Stripe event: {e}")))?;

    let provider = PaymentProvider::Stripe.as_str();
    if !WebhookEventRepo::record(&state.pool, provider, &event.id, &event.event_type).await? {
        tracing::info!(event_id = %event.id, "Duplicate Stripe event ignored");
        return Ok(Json(ACK));
    }

    if let Err(e) = handle_stripe_event(&state.pool, &event, Utc::now()).await {
        tracing::error!(event_id = %event.id, event_type = %event.event_type, error = %e, "Stripe event failed");
        WebhookEventRepo::forget(&state.pool, provider, &event.id).await?;
        return Err(e);
    }

    Ok(Json(ACK))
}

/// POST /api/v1/webhooks/mercadopago
///
/// Accepts both the webhook and the legacy IPN notification shapes. Only
/// payment notifications are acted on; the payment is re-read from the API.
pub async fn mercadopago(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let json: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Malformed MercadoPago notification: {e}")))?
    };

    let notification = parse_notification(&json, &query)
        .ok_or_else(|| AppError::BadRequest("Unrecognized MercadoPago notification".into()))?;

    let billing = &state.config.billing;
    match billing.mercadopago_webhook_secret.as_deref() {
        Some(secret) => verify_mercadopago(
            header(&headers, MERCADOPAGO_SIGNATURE_HEADER),
            &notification.data_id,
            header(&headers, MERCADOPAGO_REQUEST_ID_HEADER),
            secret,
            billing.webhook_tolerance_secs,
            Utc::now(),
        )
        .map_err(signature_rejected)?,
        None if billing.allow_unsigned_webhooks => {
            tracing::warn!("Accepting unsigned MercadoPago notification");
        }
        None => return Err(GatewayError::NotConfigured("MercadoPago").into()),
    }

    if !notification.is_payment() {
        tracing::debug!(topic = %notification.topic, "Ignoring MercadoPago notification");
        return Ok(Json(ACK));
    }

    let payment = state
        .gateway
        .fetch_mercadopago_payment(&notification.data_id)
        .await?;
    handle_mercadopago_payment(&state.pool, &payment, Utc::now()).await?;

    Ok(Json(ACK))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn signature_rejected(err: SignatureError) -> AppError {
    tracing::warn!(error = %err, "Webhook signature rejected");
    AppError::Core(CoreError::Unauthorized(err.to_string()))
}
