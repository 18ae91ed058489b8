#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use innerai_api::auth::jwt::{generate_access_token, JwtConfig};
use innerai_api::billing::{
    CheckoutRequest, CheckoutSession, GatewayError, MercadoPagoPayment, PaymentGateway,
};
use innerai_api::config::{BillingConfig, ServerConfig};
use innerai_api::router::build_app_router;
use innerai_api::state::AppState;
use innerai_core::roles::ROLE_USER;
use innerai_core::subscription::PaymentProvider;
use innerai_db::models::user::{CreateUser, User};
use innerai_db::repositories::UserRepo;

pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const MERCADOPAGO_WEBHOOK_SECRET: &str = "mp_test_secret";
pub const SIGNUP_BONUS: i64 = 500;

/// Build a test `ServerConfig` with safe defaults and both webhook secrets
/// set. Provider API keys are left unset; the stub gateway stands in.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        signup_bonus_credits: SIGNUP_BONUS,
        low_balance_threshold: 100,
        subscription_expiry_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "test-secret-at-least-32-bytes-long!!".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        billing: BillingConfig {
            stripe_secret_key: None,
            stripe_webhook_secret: Some(STRIPE_WEBHOOK_SECRET.to_string()),
            stripe_prices: HashMap::new(),
            stripe_api_base: "http://127.0.0.1:9".to_string(),
            mercadopago_access_token: None,
            mercadopago_webhook_secret: Some(MERCADOPAGO_WEBHOOK_SECRET.to_string()),
            mercadopago_api_base: "http://127.0.0.1:9".to_string(),
            mercadopago_notification_url: None,
            webhook_tolerance_secs: 300,
            allow_unsigned_webhooks: false,
            checkout_success_url: "http://localhost:3000/dashboard?success=true".to_string(),
            checkout_cancel_url: "http://localhost:3000/pricing?canceled=true".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Stub gateway
// ---------------------------------------------------------------------------

/// Records checkouts and cancellations instead of calling providers and
/// serves MercadoPago payments from a preset map.
#[derive(Default)]
pub struct StubGateway {
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    pub payments: Mutex<HashMap<String, MercadoPagoPayment>>,
    /// `(stripe_subscription_id, at_period_end)` per cancellation.
    pub cancellations: Mutex<Vec<(String, bool)>>,
    cancellations_fail: AtomicBool,
}

impl StubGateway {
    pub fn add_payment(&self, payment: MercadoPagoPayment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.clone(), payment);
    }

    pub fn checkout_count(&self) -> usize {
        self.checkouts.lock().unwrap().len()
    }

    /// Make every following cancellation fail as if Stripe were down.
    pub fn fail_cancellations(&self) {
        self.cancellations_fail.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> Vec<(String, bool)> {
        self.cancellations.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        let provider = request.method.provider();
        let id = format!("stub_{}_{}", provider.as_str().to_lowercase(), checkouts.len());
        let url = match provider {
            PaymentProvider::Stripe => format!("https://checkout.stripe.test/{id}"),
            _ => format!("https://mercadopago.test/checkout/{id}"),
        };
        Ok(CheckoutSession { provider, id, url })
    }

    async fn fetch_mercadopago_payment(
        &self,
        payment_id: &str,
    ) -> Result<MercadoPagoPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or(GatewayError::Api {
                status: 404,
                message: "Payment not found".into(),
            })
    }

    async fn cancel_subscription(
        &self,
        stripe_subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), GatewayError> {
        if self.cancellations_fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 500,
                message: "Stripe is unavailable".into(),
            });
        }
        self.cancellations
            .lock()
            .unwrap()
            .push((stripe_subscription_id.to_string(), at_period_end));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the full application router with all middleware layers, using the
/// given database pool and a fresh stub gateway.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, Arc::new(StubGateway::default()), test_config())
}

/// Same as [`build_test_app`] with a caller-owned gateway and config.
pub fn build_test_app_with(
    pool: PgPool,
    gateway: Arc<StubGateway>,
    config: ServerConfig,
) -> Router {
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        gateway,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user with the given role and return it with a signed access
/// token.
pub async fn create_user_with_token(pool: &PgPool, email: &str, role: &str) -> (User, String) {
    let input = CreateUser {
        email: email.to_string(),
        name: None,
        password_hash: "not-a-real-hash".to_string(),
        role: role.to_string(),
    };
    let user = UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed");
    let token = generate_access_token(user.id, role, &test_config().jwt)
        .expect("token signing should succeed");
    (user, token)
}

/// A regular user with zero credits on the FREE plan.
pub async fn create_user(pool: &PgPool, email: &str) -> (User, String) {
    create_user_with_token(pool, email, ROLE_USER).await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    json: serde_json::Value,
    token: &str,
) -> Response<Body> {
    json_auth(app, Method::POST, uri, json, token).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    json: serde_json::Value,
    token: &str,
) -> Response<Body> {
    json_auth(app, Method::PUT, uri, json, token).await
}

async fn json_auth(
    app: Router,
    method: Method,
    uri: &str,
    json: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST a raw body with extra headers. Used for signed webhooks.
pub async fn post_raw(
    app: Router,
    uri: &str,
    body: &str,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
