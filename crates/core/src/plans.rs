//! Plan tiers, their usage limits and their prices.
//!
//! Plans are a fixed lookup table: the database only stores the plan name on
//! the user row (`users.plan_type`) and on each subscription.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models;
use crate::types::Cents;

/// Currency every plan and package is priced in.
pub const BILLING_CURRENCY: &str = "BRL";

/// Subscription tier, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Free,
    Lite,
    Pro,
    Enterprise,
}

impl PlanType {
    pub const ALL: [PlanType; 4] = [
        PlanType::Free,
        PlanType::Lite,
        PlanType::Pro,
        PlanType::Enterprise,
    ];

    /// Storage / wire name (`"FREE"`, `"PRO"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Free => "FREE",
            PlanType::Lite => "LITE",
            PlanType::Pro => "PRO",
            PlanType::Enterprise => "ENTERPRISE",
        }
    }

    /// Position in the tier ordering. Higher ranks include everything lower
    /// ranks can access.
    pub fn rank(self) -> u8 {
        match self {
            PlanType::Free => 0,
            PlanType::Lite => 1,
            PlanType::Pro => 2,
            PlanType::Enterprise => 3,
        }
    }

    pub fn is_paid(self) -> bool {
        self != PlanType::Free
    }

    pub fn limits(self) -> PlanLimits {
        match self {
            PlanType::Free => PlanLimits {
                daily_messages: Some(10),
                monthly_tokens: Some(100_000),
            },
            PlanType::Lite => PlanLimits {
                daily_messages: Some(100),
                monthly_tokens: Some(1_000_000),
            },
            PlanType::Pro => PlanLimits {
                daily_messages: Some(500),
                monthly_tokens: Some(5_000_000),
            },
            PlanType::Enterprise => PlanLimits {
                daily_messages: None,
                monthly_tokens: None,
            },
        }
    }

    /// Monthly list price in cents. `None` for the free tier.
    pub fn monthly_price(self) -> Option<Cents> {
        match self {
            PlanType::Free => None,
            PlanType::Lite => Some(2_700),
            PlanType::Pro => Some(4_700),
            PlanType::Enterprise => Some(19_700),
        }
    }

    /// Price for one billing period of the given cycle.
    ///
    /// Yearly billing charges ten monthly periods.
    pub fn price(self, cycle: BillingCycle) -> Option<Cents> {
        self.monthly_price().map(|monthly| match cycle {
            BillingCycle::Monthly => monthly,
            BillingCycle::Yearly => monthly * 10,
        })
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = CoreError;

    /// Case-insensitive: checkout metadata carries lower-case plan ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(PlanType::Free),
            "LITE" => Ok(PlanType::Lite),
            "PRO" => Ok(PlanType::Pro),
            "ENTERPRISE" => Ok(PlanType::Enterprise),
            other => Err(CoreError::Validation(format!("Unknown plan type: '{other}'"))),
        }
    }
}

/// Usage ceilings for a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub daily_messages: Option<i64>,
    pub monthly_tokens: Option<i64>,
}

/// Length of one paid subscription period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Lenient parse used for provider metadata: anything other than
    /// `yearly` is treated as monthly.
    pub fn from_metadata(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "yearly" => BillingCycle::Yearly,
            _ => BillingCycle::Monthly,
        }
    }
}

/// Public description of one plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub plan: PlanType,
    pub limits: PlanLimits,
    pub currency: &'static str,
    pub monthly_price_cents: Option<Cents>,
    pub yearly_price_cents: Option<Cents>,
    pub models_allowed: Vec<&'static str>,
}

/// List every plan with its limits, prices and accessible models.
pub fn plan_catalog() -> Vec<PlanInfo> {
    PlanType::ALL
        .iter()
        .map(|&plan| PlanInfo {
            plan,
            limits: plan.limits(),
            currency: BILLING_CURRENCY,
            monthly_price_cents: plan.price(BillingCycle::Monthly),
            yearly_price_cents: plan.price(BillingCycle::Yearly),
            models_allowed: models::models_for_plan(plan)
                .map(|m| m.id)
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_names_round_trip() {
        for plan in PlanType::ALL {
            assert_eq!(plan.as_str().parse::<PlanType>().unwrap(), plan);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("pro".parse::<PlanType>().unwrap(), PlanType::Pro);
        assert_eq!(" Enterprise ".parse::<PlanType>().unwrap(), PlanType::Enterprise);
    }

    #[test]
    fn parse_rejects_unknown_plan() {
        assert!("platinum".parse::<PlanType>().is_err());
    }

    #[test]
    fn ranks_are_strictly_increasing() {
        let ranks: Vec<u8> = PlanType::ALL.iter().map(|p| p.rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn enterprise_is_unlimited() {
        let limits = PlanType::Enterprise.limits();
        assert_eq!(limits.daily_messages, None);
        assert_eq!(limits.monthly_tokens, None);
    }

    #[test]
    fn free_plan_limits() {
        let limits = PlanType::Free.limits();
        assert_eq!(limits.daily_messages, Some(10));
        assert_eq!(limits.monthly_tokens, Some(100_000));
    }

    #[test]
    fn free_plan_has_no_price() {
        assert_eq!(PlanType::Free.price(BillingCycle::Monthly), None);
        assert!(!PlanType::Free.is_paid());
    }

    #[test]
    fn yearly_price_is_ten_months() {
        assert_eq!(PlanType::Pro.price(BillingCycle::Monthly), Some(4_700));
        assert_eq!(PlanType::Pro.price(BillingCycle::Yearly), Some(47_000));
    }

    #[test]
    fn billing_cycle_metadata_defaults_to_monthly() {
        assert_eq!(BillingCycle::from_metadata(None), BillingCycle::Monthly);
        assert_eq!(BillingCycle::from_metadata(Some("weekly")), BillingCycle::Monthly);
        assert_eq!(BillingCycle::from_metadata(Some("YEARLY")), BillingCycle::Yearly);
    }

    #[test]
    fn catalog_lists_every_plan_with_growing_model_sets() {
        let catalog = plan_catalog();
        assert_eq!(catalog.len(), 4);
        let sizes: Vec<usize> = catalog.iter().map(|p| p.models_allowed.len()).collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert!(catalog[0].models_allowed.contains(&"gpt-3.5-turbo"));
    }

    #[test]
    fn plan_serializes_upper_case() {
        let json = serde_json::to_string(&PlanType::Lite).unwrap();
        assert_eq!(json, "\"LITE\"");
    }
}
