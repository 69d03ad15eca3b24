//! Handlers for dependency edges of a project version.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use packforge_core::error::CoreError;
use packforge_core::naming;
use packforge_core::roles::ROLE_OWNER;
use packforge_db::graph::DependencyGraph;
use packforge_db::models::dependency::AddDependency;
use packforge_db::models::project_version::ProjectVersionInfo;
use packforge_db::repositories::{DependencyRepo, ProjectVersionRepo};
use serde::Deserialize;

use crate::auth::{require_project_role, AuthUser};
use crate::error::{AppError, AppResult};
use crate::handlers::resolve_version;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DependencyListQuery {
    /// Return candidate dependencies instead of the existing set.
    #[serde(default)]
    pub candidates: bool,
    /// Case-insensitive substring filter on the fully-qualified name.
    pub q: Option<String>,
}

/// GET /api/projects/{project}/{version}/dependencies
///
/// Existing dependencies, or (with `?candidates=true`) versions that
/// may still be added under the dependency policies.
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Query(query): Query<DependencyListQuery>,
) -> AppResult<Json<Vec<ProjectVersionInfo>>> {
    let (_, version) = resolve_version(&state.pool, &project_name, &version_name).await?;

    let results = if query.candidates {
        DependencyGraph::candidates(&state.pool, version.id, query.q.as_deref()).await?
    } else {
        DependencyRepo::dependency_infos(&state.pool, version.id, query.q.as_deref()).await?
    };
    Ok(Json(results))
}

/// POST /api/projects/{project}/{version}/dependencies
pub async fn add(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Json(input): Json<AddDependency>,
) -> AppResult<StatusCode> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let (dep_project, dep_version) =
        naming::parse_version_ref(&input.dependency).map_err(AppError::Core)?;
    let dependency = ProjectVersionRepo::find_by_fullname(&state.pool, dep_project, dep_version)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Dependency '{}' not found",
                input.dependency
            )))
        })?;

    DependencyGraph::add_dependency(&state.pool, version.id, dependency.id, input.use_cibuilds)
        .await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/projects/{project}/{version}/dependency/{dep_project}/{dep_version}
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name, dep_project, dep_version)): Path<(
        String,
        String,
        String,
        String,
    )>,
) -> AppResult<StatusCode> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let dependency = ProjectVersionRepo::find_by_fullname(&state.pool, &dep_project, &dep_version)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Dependency '{dep_project}/{dep_version}' not found"
            )))
        })?;

    DependencyGraph::remove_dependency(&state.pool, version.id, dependency.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
