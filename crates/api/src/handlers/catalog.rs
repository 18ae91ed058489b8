//! Read-only catalogs: plans, models and tools, credit packages.

use axum::extract::State;
use axum::Json;
use innerai_core::credits::{CreditPackage, CREDIT_PACKAGES};
use innerai_core::models::{MODELS, TOOLS};
use innerai_core::plans::{plan_catalog, PlanInfo, PlanType};
use innerai_core::types::Credits;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::users::load_user;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub min_plan: PlanType,
    pub credits_per_million_input: Credits,
    pub credits_per_million_output: Credits,
    /// Whether the caller's plan may use it.
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct ToolEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub min_plan: PlanType,
    pub credits_per_use: Credits,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelCatalog {
    pub plan_type: PlanType,
    pub models: Vec<ModelEntry>,
    pub tools: Vec<ToolEntry>,
}

/// GET /api/v1/plans
pub async fn list_plans() -> Json<DataResponse<Vec<PlanInfo>>> {
    Json(DataResponse {
        data: plan_catalog(),
    })
}

/// GET /api/v1/credits/packages
pub async fn list_packages() -> Json<DataResponse<&'static [CreditPackage]>> {
    Json(DataResponse {
        data: CREDIT_PACKAGES,
    })
}

/// GET /api/v1/models
///
/// Every model and tool, flagged with whether the caller's plan covers it.
pub async fn list_models(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<ModelCatalog>>> {
    let plan = load_user(&state, auth.user_id).await?.plan();
    Ok(Json(DataResponse {
        data: model_catalog(plan),
    }))
}

fn model_catalog(plan: PlanType) -> ModelCatalog {
    let covers = |min_plan: PlanType| plan.rank() >= min_plan.rank();

    ModelCatalog {
        plan_type: plan,
        models: MODELS
            .iter()
            .map(|m| ModelEntry {
                id: m.id,
                name: m.name,
                provider: m.provider,
                min_plan: m.min_plan,
                credits_per_million_input: m.credits_per_million_input,
                credits_per_million_output: m.credits_per_million_output,
                available: covers(m.min_plan),
            })
            .collect(),
        tools: TOOLS
            .iter()
            .map(|t| ToolEntry {
                id: t.id,
                name: t.name,
                min_plan: t.min_plan,
                credits_per_use: t.credits_per_use,
                available: covers(t.min_plan),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_follows_plan_rank() {
        let free = model_catalog(PlanType::Free);
        let gpt4 = free.models.iter().find(|m| m.id == "gpt-4").unwrap();
        assert!(!gpt4.available);
        assert!(free.tools.iter().all(|t| t.available));

        let pro = model_catalog(PlanType::Pro);
        assert!(pro.models.iter().find(|m| m.id == "gpt-4").unwrap().available);
        assert!(!pro.models.iter().find(|m| m.id == "claude-3-opus").unwrap().available);
    }
}
