//! Applying verified provider events.
//!
//! Every path is safe to replay: payments are recorded once per provider
//! id, and subscription updates only touch rows that are still live.
//! Events that reference unknown users or malformed metadata are logged and
//! acknowledged so the provider stops retrying them.

use innerai_core::credits::{find_package, CreditPackage};
use innerai_core::plans::{BillingCycle, PlanType, BILLING_CURRENCY};
use innerai_core::subscription::{
    expiry_from, map_mercadopago_status, resolve_stripe_update, PaymentProvider,
    SubscriptionStatus, SubscriptionUpdate,
};
use innerai_core::types::{DbId, Timestamp};
use innerai_db::models::payment::{NewPayment, PURPOSE_CREDITS, PURPOSE_SUBSCRIPTION};
use innerai_db::models::subscription::NewSubscription;
use innerai_db::repositories::{CreditRepo, SubscriptionRepo, UserRepo};
use innerai_db::DbPool;

use super::mercadopago::{self, MercadoPagoPayment};
use super::stripe::{self, CheckoutSessionObject, StripeEvent, SubscriptionObject};
use crate::error::{AppError, AppResult};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

// ---------------------------------------------------------------------------
// Stripe
// ---------------------------------------------------------------------------

pub async fn handle_stripe_event(pool: &DbPool, event: &StripeEvent, now: Timestamp) -> AppResult<()> {
    match event.event_type.as_str() {
        CHECKOUT_COMPLETED | CHECKOUT_ASYNC_SUCCEEDED => {
            let session: CheckoutSessionObject = parse_object(event)?;
            stripe_checkout_completed(pool, &session, now).await
        }
        SUBSCRIPTION_UPDATED => {
            let sub: SubscriptionObject = parse_object(event)?;
            let update = resolve_stripe_update(&sub.status, sub.cancel_at_period_end, sub.period_end());
            apply_stripe_update(pool, &sub.id, &update, now).await
        }
        SUBSCRIPTION_DELETED => {
            let sub: SubscriptionObject = parse_object(event)?;
            let update = SubscriptionUpdate {
                status: SubscriptionStatus::Cancelled,
                expires_at: Some(now),
                cancel_at_period_end: false,
            };
            apply_stripe_update(pool, &sub.id, &update, now).await
        }
        other => {
            tracing::debug!(event_id = %event.id, event_type = other, "Ignoring Stripe event");
            Ok(())
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> AppResult<T> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        AppError::BadRequest(format!("Malformed {} payload: {e}", event.event_type))
    })
}

async fn stripe_checkout_completed(
    pool: &DbPool,
    session: &CheckoutSessionObject,
    now: Timestamp,
) -> AppResult<()> {
    // Boleto-style async methods complete the session before the money
    // arrives; `async_payment_succeeded` follows once it does.
    if session.payment_status.as_deref() == Some("unpaid") {
        tracing::info!(session_id = %session.id, "Checkout completed but unpaid, waiting");
        return Ok(());
    }

    let Some(user_id) = known_user(pool, session.user_id(), &session.id).await? else {
        return Ok(());
    };

    let currency = session
        .currency
        .as_deref()
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| BILLING_CURRENCY.to_string());

    if let Some(plan_id) = session.meta(stripe::META_PLAN_ID) {
        let Some(plan) = paid_plan(plan_id) else {
            tracing::warn!(session_id = %session.id, plan_id, "Checkout for unknown plan");
            return Ok(());
        };
        let cycle = BillingCycle::from_metadata(session.meta(stripe::META_BILLING_CYCLE));

        let subscription = NewSubscription {
            user_id,
            plan,
            billing_cycle: cycle,
            provider: PaymentProvider::Stripe,
            stripe_subscription_id: session.subscription.clone(),
            stripe_customer_id: session.customer.clone(),
            mercadopago_payment_id: None,
            started_at: now,
            expires_at: Some(expiry_from(now, cycle)),
        };
        let payment = NewPayment {
            user_id,
            provider: PaymentProvider::Stripe,
            provider_payment_id: session.id.clone(),
            purpose: PURPOSE_SUBSCRIPTION,
            plan_type: Some(plan.as_str().to_string()),
            package_id: None,
            amount_cents: session
                .amount_total
                .or(plan.price(cycle))
                .unwrap_or(0),
            currency,
        };

        match SubscriptionRepo::activate(pool, &subscription, Some(&payment)).await? {
            Some(sub) => tracing::info!(
                user_id,
                subscription_id = sub.id,
                plan = %plan,
                "Subscription activated from Stripe checkout"
            ),
            None => tracing::info!(session_id = %session.id, "Stripe checkout already processed"),
        }
        return Ok(());
    }

    if let Some(package_id) = session.meta(stripe::META_PACKAGE_ID) {
        let Some(package) = find_package(package_id) else {
            tracing::warn!(session_id = %session.id, package_id, "Checkout for unknown package");
            return Ok(());
        };
        let payment = NewPayment {
            user_id,
            provider: PaymentProvider::Stripe,
            provider_payment_id: session.id.clone(),
            purpose: PURPOSE_CREDITS,
            plan_type: None,
            package_id: Some(package.id.to_string()),
            amount_cents: session.amount_total.unwrap_or(package.price_cents),
            currency,
        };
        grant_package(pool, package, &payment).await?;
        return Ok(());
    }

    tracing::warn!(session_id = %session.id, "Checkout session carries no plan or package");
    Ok(())
}

async fn apply_stripe_update(
    pool: &DbPool,
    stripe_subscription_id: &str,
    update: &SubscriptionUpdate,
    now: Timestamp,
) -> AppResult<()> {
    match SubscriptionRepo::apply_stripe_update(pool, stripe_subscription_id, update, now).await? {
        Some(sub) => tracing::info!(
            user_id = sub.user_id,
            subscription_id = sub.id,
            status = %update.status,
            "Stripe subscription updated"
        ),
        None => tracing::debug!(
            stripe_subscription_id,
            "No live subscription for Stripe update"
        ),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MercadoPago
// ---------------------------------------------------------------------------

pub async fn handle_mercadopago_payment(
    pool: &DbPool,
    payment: &MercadoPagoPayment,
    now: Timestamp,
) -> AppResult<()> {
    match map_mercadopago_status(&payment.status) {
        Some(SubscriptionStatus::Active) => mercadopago_approved(pool, payment, now).await,
        Some(_) => {
            if let Some(sub) =
                SubscriptionRepo::cancel_by_mercadopago_payment(pool, &payment.id, now).await?
            {
                tracing::info!(
                    user_id = sub.user_id,
                    subscription_id = sub.id,
                    status = %payment.status,
                    "Subscription cancelled by MercadoPago payment"
                );
            }
            Ok(())
        }
        None => {
            tracing::debug!(payment_id = %payment.id, status = %payment.status, "Ignoring MercadoPago payment status");
            Ok(())
        }
    }
}

async fn mercadopago_approved(
    pool: &DbPool,
    payment: &MercadoPagoPayment,
    now: Timestamp,
) -> AppResult<()> {
    let Some(user_id) = known_user(pool, payment.user_id(), &payment.id).await? else {
        return Ok(());
    };
    let currency = payment
        .currency_id
        .clone()
        .unwrap_or_else(|| BILLING_CURRENCY.to_string());

    if let Some(plan_id) = payment.meta(mercadopago::META_PLAN_ID) {
        let Some(plan) = paid_plan(&plan_id) else {
            tracing::warn!(payment_id = %payment.id, plan_id = %plan_id, "Payment for unknown plan");
            return Ok(());
        };
        let cycle = BillingCycle::from_metadata(
            payment.meta(mercadopago::META_BILLING_CYCLE).as_deref(),
        );

        let subscription = NewSubscription {
            user_id,
            plan,
            billing_cycle: cycle,
            provider: PaymentProvider::MercadoPago,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            mercadopago_payment_id: Some(payment.id.clone()),
            started_at: now,
            expires_at: Some(expiry_from(now, cycle)),
        };
        let record = NewPayment {
            user_id,
            provider: PaymentProvider::MercadoPago,
            provider_payment_id: payment.id.clone(),
            purpose: PURPOSE_SUBSCRIPTION,
            plan_type: Some(plan.as_str().to_string()),
            package_id: None,
            amount_cents: payment.amount_cents(),
            currency,
        };

        match SubscriptionRepo::activate(pool, &subscription, Some(&record)).await? {
            Some(sub) => tracing::info!(
                user_id,
                subscription_id = sub.id,
                plan = %plan,
                "Subscription activated from MercadoPago payment"
            ),
            None => tracing::info!(payment_id = %payment.id, "MercadoPago payment already processed"),
        }
        return Ok(());
    }

    if let Some(package_id) = payment.meta(mercadopago::META_PACKAGE_ID) {
        let Some(package) = find_package(&package_id) else {
            tracing::warn!(payment_id = %payment.id, package_id = %package_id, "Payment for unknown package");
            return Ok(());
        };
        let record = NewPayment {
            user_id,
            provider: PaymentProvider::MercadoPago,
            provider_payment_id: payment.id.clone(),
            purpose: PURPOSE_CREDITS,
            plan_type: None,
            package_id: Some(package.id.to_string()),
            amount_cents: payment.amount_cents(),
            currency,
        };
        grant_package(pool, package, &record).await?;
        return Ok(());
    }

    tracing::warn!(payment_id = %payment.id, "Approved payment carries no plan or package");
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// The referenced user id, if present and pointing at an existing user.
async fn known_user(
    pool: &DbPool,
    user_id: Option<DbId>,
    reference: &str,
) -> AppResult<Option<DbId>> {
    let Some(user_id) = user_id else {
        tracing::warn!(reference, "Payment event without a user reference");
        return Ok(None);
    };
    if UserRepo::find_by_id(pool, user_id).await?.is_none() {
        tracing::warn!(reference, user_id, "Payment event for unknown user");
        return Ok(None);
    }
    Ok(Some(user_id))
}

fn paid_plan(plan_id: &str) -> Option<PlanType> {
    plan_id
        .parse::<PlanType>()
        .ok()
        .filter(|plan| plan.is_paid())
}

async fn grant_package(
    pool: &DbPool,
    package: &CreditPackage,
    payment: &NewPayment,
) -> AppResult<()> {
    match CreditRepo::grant_for_payment(pool, package, payment).await? {
        Some(entry) => tracing::info!(
            user_id = payment.user_id,
            package_id = package.id,
            balance_after = entry.balance_after,
            "Credit package granted"
        ),
        None => tracing::info!(
            payment_id = %payment.provider_payment_id,
            "Credit package payment already processed"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_paid_plans_are_activated() {
        assert_eq!(paid_plan("pro"), Some(PlanType::Pro));
        assert_eq!(paid_plan("LITE"), Some(PlanType::Lite));
        assert_eq!(paid_plan("free"), None);
        assert_eq!(paid_plan("gold"), None);
    }
}
