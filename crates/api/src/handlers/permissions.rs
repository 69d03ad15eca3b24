//! Handlers granting project roles to users.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use packforge_core::error::CoreError;
use packforge_core::roles;
use serde::Deserialize;

use crate::auth::{require_project_role, AuthUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GrantRole {
    pub username: String,
    pub role: String,
}

/// PUT /api/projects/{project}/permissions
///
/// Grant or change a user's role on a project. Owners (and admins) only;
/// the built-in admin account cannot be granted roles.
pub async fn grant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_name): Path<String>,
    Json(input): Json<GrantRole>,
) -> AppResult<StatusCode> {
    if !roles::is_valid_role(&input.role) {
        return Err(AppError::Core(CoreError::Validation("Invalid role".into())));
    }
    if input.username.eq_ignore_ascii_case("admin") {
        return Err(AppError::Core(CoreError::Validation("User not allowed".into())));
    }

    let project = crate::handlers::project_by_name(&state.pool, &project_name).await?;
    require_project_role(&state.pool, &user, project.id, &[roles::ROLE_OWNER]).await?;

    let target = packforge_db::repositories::UserRepo::find_by_username(
        &state.pool,
        &input.username,
    )
    .await?
    .ok_or_else(|| AppError::Core(CoreError::Validation("User not found".into())))?;

    packforge_db::repositories::UserRepo::set_project_role(
        &state.pool,
        target.id,
        project.id,
        &input.role,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
