//! Repository for credit balances and the `credit_transactions` ledger.
//!
//! Every balance change locks the user row (`FOR UPDATE`), applies the
//! arithmetic from [`innerai_core::credits`] and writes one ledger row with
//! consistent `balance_before` / `balance_after`, all in one transaction.

use sqlx::{PgConnection, PgPool};

use innerai_core::credits::{self, CreditPackage, TransactionKind};
use innerai_core::error::CoreError;
use innerai_core::types::{Credits, DbId, Timestamp};

use crate::error::LedgerError;
use crate::models::credit_transaction::{CreditTotals, CreditTransaction, LedgerNote};
use crate::models::payment::NewPayment;
use crate::repositories::PaymentRepo;

const COLUMNS: &str = "id, user_id, kind, amount, balance_before, balance_after, \
                       description, reference_id, reference_type, created_at";

pub struct CreditRepo;

impl CreditRepo {
    /// Current balance, or `None` for an unknown user.
    pub async fn balance(pool: &PgPool, user_id: DbId) -> Result<Option<Credits>, sqlx::Error> {
        let row: Option<(Credits,)> =
            sqlx::query_as("SELECT credit_balance FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Debit credits for usage. Fails with `InsufficientCredits` and leaves
    /// the balance untouched when the user cannot cover `amount`.
    pub async fn consume(
        pool: &PgPool,
        user_id: DbId,
        amount: Credits,
        note: &LedgerNote,
    ) -> Result<CreditTransaction, LedgerError> {
        Self::debit(pool, user_id, amount, TransactionKind::Consumption, note).await
    }

    /// Debit credits with an explicit ledger kind.
    pub async fn debit(
        pool: &PgPool,
        user_id: DbId,
        amount: Credits,
        kind: TransactionKind,
        note: &LedgerNote,
    ) -> Result<CreditTransaction, LedgerError> {
        let mut tx = pool.begin().await?;
        let entry = apply_debit(&mut *tx, user_id, amount, kind, note).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Add credits to a user's balance.
    pub async fn grant(
        pool: &PgPool,
        user_id: DbId,
        amount: Credits,
        kind: TransactionKind,
        note: &LedgerNote,
    ) -> Result<CreditTransaction, LedgerError> {
        let mut tx = pool.begin().await?;
        let entry = apply_credit(&mut *tx, user_id, amount, kind, note).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Record a package payment and grant its credits.
    ///
    /// Returns `None` without touching the balance when the payment was
    /// already recorded, so provider retries never double-grant.
    pub async fn grant_for_payment(
        pool: &PgPool,
        package: &CreditPackage,
        payment: &NewPayment,
    ) -> Result<Option<CreditTransaction>, LedgerError> {
        let mut tx = pool.begin().await?;

        if PaymentRepo::insert_if_new(&mut *tx, payment).await?.is_none() {
            return Ok(None);
        }

        let note = LedgerNote::new(format!("Purchased {}", package.name))
            .with_reference("payment", payment.provider_payment_id.clone());
        let entry = apply_credit(
            &mut *tx,
            payment.user_id,
            package.credits,
            TransactionKind::Purchase,
            &note,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(entry))
    }

    /// Ledger rows for a user, newest first.
    pub async fn history(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_transactions WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_history(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// Consumed and purchased sums in `[start, end)`; unbounded sides are
    /// open.
    pub async fn totals(
        pool: &PgPool,
        user_id: DbId,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<CreditTotals, sqlx::Error> {
        sqlx::query_as::<_, CreditTotals>(
            "SELECT
                COALESCE(SUM(-amount) FILTER (WHERE kind = 'CONSUMPTION'), 0)::BIGINT AS consumed,
                COALESCE(SUM(amount) FILTER (WHERE kind = 'PURCHASE'), 0)::BIGINT AS purchased
             FROM credit_transactions
             WHERE user_id = $1
               AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
               AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped helpers
// ---------------------------------------------------------------------------

/// Lock the user row and return its balance.
pub(crate) async fn lock_balance(conn: &mut PgConnection, user_id: DbId) -> Result<Credits, LedgerError> {
    let row: Option<(Credits,)> =
        sqlx::query_as("SELECT credit_balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(|r| r.0).ok_or(LedgerError::Core(CoreError::NotFound {
        entity: "User",
        id: user_id,
    }))
}

pub(crate) async fn apply_debit(
    conn: &mut PgConnection,
    user_id: DbId,
    amount: Credits,
    kind: TransactionKind,
    note: &LedgerNote,
) -> Result<CreditTransaction, LedgerError> {
    let before = lock_balance(conn, user_id).await?;
    let after = credits::debit(before, amount)?;
    write_entry(conn, user_id, kind, -amount, before, after, note).await
}

pub(crate) async fn apply_credit(
    conn: &mut PgConnection,
    user_id: DbId,
    amount: Credits,
    kind: TransactionKind,
    note: &LedgerNote,
) -> Result<CreditTransaction, LedgerError> {
    let before = lock_balance(conn, user_id).await?;
    let after = credits::credit(before, amount)?;
    write_entry(conn, user_id, kind, amount, before, after, note).await
}

async fn write_entry(
    conn: &mut PgConnection,
    user_id: DbId,
    kind: TransactionKind,
    amount: Credits,
    before: Credits,
    after: Credits,
    note: &LedgerNote,
) -> Result<CreditTransaction, LedgerError> {
    sqlx::query("UPDATE users SET credit_balance = $2 WHERE id = $1")
        .bind(user_id)
        .bind(after)
        .execute(&mut *conn)
        .await?;

    let query = format!(
        "INSERT INTO credit_transactions
            (user_id, kind, amount, balance_before, balance_after, description,
             reference_id, reference_type)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {COLUMNS}"
    );
    let entry = sqlx::query_as::<_, CreditTransaction>(&query)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(amount)
        .bind(before)
        .bind(after)
        .bind(&note.description)
        .bind(&note.reference_id)
        .bind(&note.reference_type)
        .fetch_one(&mut *conn)
        .await?;
    Ok(entry)
}
