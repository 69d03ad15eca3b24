//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use packforge_core::error::CoreError;
use packforge_db::models::project::{CreateProject, Project};
use packforge_db::repositories::ProjectRepo;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/projects (admin only)
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    if !user.is_admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "Admin required to create projects".into(),
        )));
    }
    if !packforge_core::naming::is_name_valid(&input.name) {
        return Err(AppError::Core(CoreError::Validation(
            "Invalid project name".into(),
        )));
    }
    let project = ProjectRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
pub async fn list(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let projects = ProjectRepo::list(&state.pool).await?;
    Ok(Json(projects))
}

/// GET /api/projects/{name}
pub async fn get_by_name(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(name): Path<String>,
) -> AppResult<Json<Project>> {
    let project = ProjectRepo::find_by_name(&state.pool, &name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Project '{name}' could not be found"
            )))
        })?;
    Ok(Json(project))
}

/// DELETE /api/projects/{name}
///
/// Rejected while the project still owns versions (deleted or not).
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    if !user.is_admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "Admin required to delete projects".into(),
        )));
    }
    let project = ProjectRepo::find_by_name(&state.pool, &name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Project '{name}' could not be found"
            )))
        })?;
    if ProjectRepo::has_versions(&state.pool, project.id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot delete project containing projectversions".into(),
        )));
    }
    ProjectRepo::delete(&state.pool, project.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
