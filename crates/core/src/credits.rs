//! Credit ledger rules: transaction kinds, token pricing, balance arithmetic
//! and the purchasable credit packages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::ModelInfo;
use crate::plans::BILLING_CURRENCY;
use crate::types::{Cents, Credits};

/// Balance under which the client is told to top up.
pub const DEFAULT_LOW_BALANCE_THRESHOLD: Credits = 100;

/// Token counts are priced per this many tokens.
const TOKENS_PER_RATE_UNIT: i128 = 1_000_000;

/// Why a ledger row exists. Stored as upper-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Purchase,
    Consumption,
    Bonus,
    Refund,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Purchase => "PURCHASE",
            TransactionKind::Consumption => "CONSUMPTION",
            TransactionKind::Bonus => "BONUS",
            TransactionKind::Refund => "REFUND",
            TransactionKind::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(TransactionKind::Purchase),
            "CONSUMPTION" => Ok(TransactionKind::Consumption),
            "BONUS" => Ok(TransactionKind::Bonus),
            "REFUND" => Ok(TransactionKind::Refund),
            "ADJUSTMENT" => Ok(TransactionKind::Adjustment),
            other => Err(CoreError::Validation(format!(
                "Unknown transaction kind: '{other}'"
            ))),
        }
    }
}

/// Credits charged for one model completion.
///
/// Rounds up to whole credits; any non-zero usage costs at least one credit.
pub fn credits_for_tokens(model: &ModelInfo, input_tokens: i64, output_tokens: i64) -> Credits {
    let input = i128::from(input_tokens.max(0));
    let output = i128::from(output_tokens.max(0));
    if input == 0 && output == 0 {
        return 0;
    }

    let weighted = input * i128::from(model.credits_per_million_input)
        + output * i128::from(model.credits_per_million_output);
    let credits = (weighted + TOKENS_PER_RATE_UNIT - 1) / TOKENS_PER_RATE_UNIT;

    Credits::try_from(credits.max(1)).unwrap_or(Credits::MAX)
}

/// Reject zero or negative credit amounts.
pub fn validate_amount(amount: Credits) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation("Invalid credit amount".into()));
    }
    Ok(())
}

/// Balance after debiting `amount`, or [`CoreError::InsufficientCredits`].
pub fn debit(balance: Credits, amount: Credits) -> Result<Credits, CoreError> {
    validate_amount(amount)?;
    if balance < amount {
        return Err(CoreError::InsufficientCredits {
            required: amount,
            available: balance,
        });
    }
    Ok(balance - amount)
}

/// Balance after crediting `amount`.
pub fn credit(balance: Credits, amount: Credits) -> Result<Credits, CoreError> {
    validate_amount(amount)?;
    balance
        .checked_add(amount)
        .ok_or_else(|| CoreError::Validation("Credit balance overflow".into()))
}

pub fn is_low_balance(balance: Credits, threshold: Credits) -> bool {
    balance < threshold
}

/// A purchasable bundle of credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub credits: Credits,
    pub price_cents: Cents,
    pub currency: &'static str,
    pub discount_percent: i32,
}

pub const CREDIT_PACKAGES: &[CreditPackage] = &[
    CreditPackage {
        id: "pkg_5k",
        name: "Pacote 5K",
        credits: 5_000,
        price_cents: 2_990,
        currency: BILLING_CURRENCY,
        discount_percent: 0,
    },
    CreditPackage {
        id: "pkg_10k",
        name: "Pacote 10K",
        credits: 10_000,
        price_cents: 4_990,
        currency: BILLING_CURRENCY,
        discount_percent: 15,
    },
    CreditPackage {
        id: "pkg_20k",
        name: "Pacote 20K",
        credits: 20_000,
        price_cents: 7_990,
        currency: BILLING_CURRENCY,
        discount_percent: 33,
    },
];

pub fn find_package(id: &str) -> Option<&'static CreditPackage> {
    CREDIT_PACKAGES.iter().find(|p| p.id == id)
}
