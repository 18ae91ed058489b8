//! Handlers for the caller's own profile.

use axum::extract::State;
use axum::Json;
use innerai_core::error::CoreError;
use innerai_core::plans::PlanLimits;
use innerai_core::types::DbId;
use innerai_db::models::user::{User, UserResponse};
use innerai_db::repositories::UserRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub plan_limits: PlanLimits,
}

/// GET /api/v1/user/me
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<ProfileResponse>>> {
    let user = load_user(&state, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: ProfileResponse {
            user: UserResponse::from(&user),
            plan_limits: user.plan().limits(),
        },
    }))
}

/// Load the caller's row. A valid token for a deleted user is a 404.
pub(crate) async fn load_user(state: &AppState, user_id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }))
}
