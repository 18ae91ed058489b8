//! Repository for the `payments` table.

use sqlx::{PgConnection, PgPool};

use innerai_core::types::DbId;

use crate::models::payment::{NewPayment, Payment};

const COLUMNS: &str = "id, user_id, provider, provider_payment_id, purpose, plan_type, \
                       package_id, amount_cents, currency, status, created_at";

pub struct PaymentRepo;

impl PaymentRepo {
    /// A user's payments, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Insert a payment inside an open transaction.
    ///
    /// Returns `None` when the provider payment id was already recorded.
    pub(crate) async fn insert_if_new(
        conn: &mut PgConnection,
        input: &NewPayment,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments
                (user_id, provider, provider_payment_id, purpose, plan_type, package_id,
                 amount_cents, currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (provider, provider_payment_id) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(input.user_id)
            .bind(input.provider.as_str())
            .bind(&input.provider_payment_id)
            .bind(input.purpose)
            .bind(&input.plan_type)
            .bind(&input.package_id)
            .bind(input.amount_cents)
            .bind(&input.currency)
            .fetch_optional(&mut *conn)
            .await
    }
}
