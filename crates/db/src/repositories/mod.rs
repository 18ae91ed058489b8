//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Operations that touch several
//! tables run in a single transaction.

pub mod credit_repo;
pub mod payment_repo;
pub mod session_repo;
pub mod subscription_repo;
pub mod usage_repo;
pub mod user_repo;
pub mod webhook_event_repo;

pub use credit_repo::CreditRepo;
pub use payment_repo::PaymentRepo;
pub use session_repo::SessionRepo;
pub use subscription_repo::SubscriptionRepo;
pub use usage_repo::UsageRepo;
pub use user_repo::UserRepo;
pub use webhook_event_repo::WebhookEventRepo;
