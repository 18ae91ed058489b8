//! Repository for the `webhook_events` de-duplication table.

use sqlx::PgPool;

use crate::models::webhook_event::WebhookEvent;

pub struct WebhookEventRepo;

impl WebhookEventRepo {
    /// Claim an event id. Returns `false` when the event was already seen.
    pub async fn record(
        pool: &PgPool,
        provider: &str,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (provider, event_id, event_type)
             VALUES ($1, $2, $3)
             ON CONFLICT (provider, event_id) DO NOTHING",
        )
        .bind(provider)
        .bind(event_id)
        .bind(event_type)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release a claimed id so a provider retry is processed again.
    pub async fn forget(pool: &PgPool, provider: &str, event_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM webhook_events WHERE provider = $1 AND event_id = $2")
            .bind(provider)
            .bind(event_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find(
        pool: &PgPool,
        provider: &str,
        event_id: &str,
    ) -> Result<Option<WebhookEvent>, sqlx::Error> {
        sqlx::query_as::<_, WebhookEvent>(
            "SELECT id, provider, event_id, event_type, received_at
             FROM webhook_events WHERE provider = $1 AND event_id = $2",
        )
        .bind(provider)
        .bind(event_id)
        .fetch_optional(pool)
        .await
    }
}
