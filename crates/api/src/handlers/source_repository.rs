//! Handlers for source-repository associations of a project version.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use packforge_core::error::CoreError;
use packforge_core::roles::{ROLE_MEMBER, ROLE_OWNER};
use packforge_core::types::DbId;
use packforge_db::repositories::SourceRepositoryRepo;

use crate::auth::{require_project_role, AuthUser};
use crate::error::{AppError, AppResult};
use crate::handlers::resolve_version;
use crate::state::AppState;

/// DELETE /api/projects/{project}/{version}/repository/{repo_id}
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name, repo_id)): Path<(String, String, DbId)>,
) -> AppResult<StatusCode> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_MEMBER, ROLE_OWNER]).await?;

    if version.is_locked {
        return Err(AppError::Core(CoreError::Conflict(
            "Projectversion is locked".into(),
        )));
    }

    let removed = SourceRepositoryRepo::remove_association(&state.pool, repo_id, version.id).await?;
    if !removed {
        return Err(AppError::Core(CoreError::Validation(
            "Could not find the sourcerepository for the projectversion".into(),
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
