//! Processed webhook event ids.

use innerai_core::types::{DbId, Timestamp};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: DbId,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub received_at: Timestamp,
}
