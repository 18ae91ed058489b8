/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monetary amounts are integer cents of the billing currency.
pub type Cents = i64;

/// Credit amounts and balances.
pub type Credits = i64;
