//! Credit ledger rows.

use innerai_core::types::{Credits, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `credit_transactions`. `amount` is negative for debits.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditTransaction {
    pub id: DbId,
    pub user_id: DbId,
    pub kind: String,
    pub amount: Credits,
    pub balance_before: Credits,
    pub balance_after: Credits,
    pub description: String,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_at: Timestamp,
}

/// Free-text context written alongside a balance change.
#[derive(Debug, Clone)]
pub struct LedgerNote {
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

impl LedgerNote {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            reference_type: None,
            reference_id: None,
        }
    }

    pub fn with_reference(mut self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.reference_type = Some(kind.into());
        self.reference_id = Some(id.into());
        self
    }
}

/// Consumed and purchased credit sums over some period.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize)]
pub struct CreditTotals {
    pub consumed: Credits,
    pub purchased: Credits,
}
