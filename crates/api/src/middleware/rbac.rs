//! Admin gate for the `/admin` routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use innerai_core::error::CoreError;
use innerai_core::roles::ROLE_ADMIN;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `admin` role. Rejects with 403 otherwise.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role == ROLE_ADMIN {
            return Ok(RequireAdmin(user));
        }
        tracing::warn!(user_id = user.user_id, "Non-admin caller rejected from admin route");
        Err(AppError::Core(CoreError::Forbidden(
            "Admin role required".into(),
        )))
    }
}
