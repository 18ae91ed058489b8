//! Errors from repository operations that enforce business rules inside a
//! transaction (balance checks, missing rows).

use innerai_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
