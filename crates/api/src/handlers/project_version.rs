//! Handlers for project version lifecycle operations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use packforge_core::roles::ROLE_OWNER;
use packforge_db::graph::DependencyGraph;
use packforge_db::lifecycle::VersionLifecycle;
use packforge_db::models::project_version::{
    CreateProjectVersion, EditProjectVersion, ProjectVersion, ProjectVersionInfo,
};
use packforge_db::repositories::{DependencyRepo, ProjectVersionRepo};
use packforge_events::{Event, Subject, WsMessage};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{require_project_role, AuthUser};
use crate::error::{AppError, AppResult};
use crate::handlers::resolve_version;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub forceremoval: bool,
}

#[derive(Debug, Deserialize)]
pub struct AptSourcesQuery {
    #[serde(default)]
    pub unstable: bool,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub name: String,
}

/// GET /api/projects/{project}/versions
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(project_name): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ProjectVersionInfo>>> {
    let project = crate::handlers::project_by_name(&state.pool, &project_name).await?;
    let versions =
        ProjectVersionRepo::list_for_project(&state.pool, project.id, query.q.as_deref()).await?;
    Ok(Json(versions))
}

/// POST /api/projects/{project}/versions
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_name): Path<String>,
    Json(input): Json<CreateProjectVersion>,
) -> AppResult<(StatusCode, Json<ProjectVersion>)> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let project = crate::handlers::project_by_name(&state.pool, &project_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let version =
        VersionLifecycle::create(&state.pool, &state.aptly_queue, project.id, &input).await?;

    state.event_bus.publish(
        WsMessage::event(Subject::Projectversion, Event::Added)
            .with_data(serde_json::json!({"id": version.id, "name": version.name.clone()})),
    );
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/projects/{project}/{version}
pub async fn get(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
) -> AppResult<Json<ProjectVersion>> {
    let (_, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    Ok(Json(version))
}

/// PUT /api/projects/{project}/{version}
pub async fn edit(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Json(input): Json<EditProjectVersion>,
) -> AppResult<Json<ProjectVersion>> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let version = VersionLifecycle::edit(&state.pool, version.id, &input).await?;
    Ok(Json(version))
}

/// POST /api/projects/{project}/{version}/clone
pub async fn clone(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Json(input): Json<CreateProjectVersion>,
) -> AppResult<(StatusCode, Json<ProjectVersion>)> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let version =
        VersionLifecycle::clone(&state.pool, &state.aptly_queue, version.id, &input).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// POST /api/projects/{project}/{version}/snapshot
pub async fn snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Json(input): Json<SnapshotRequest>,
) -> AppResult<(StatusCode, Json<ProjectVersion>)> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    let version =
        VersionLifecycle::snapshot(&state.pool, &state.aptly_queue, version.id, &input.name)
            .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// POST /api/projects/{project}/{version}/lock
pub async fn lock(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    VersionLifecycle::lock(&state.pool, version.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/projects/{project}/{version}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    let (project, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    require_project_role(&state.pool, &user, project.id, &[ROLE_OWNER]).await?;

    VersionLifecycle::delete(
        &state.pool,
        &state.aptly_queue,
        &state.config.buildout,
        version.id,
        query.forceremoval,
    )
    .await?;

    state.event_bus.publish(
        WsMessage::event(Subject::Projectversion, Event::Removed)
            .with_data(serde_json::json!({"id": version.id})),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/projects/{project}/{version}/aptsources
///
/// Plain-text apt sources for the version's resolved dependency set.
/// Unauthenticated: build chroots fetch this during setup.
pub async fn apt_sources(
    State(state): State<AppState>,
    Path((project_name, version_name)): Path<(String, String)>,
    Query(query): Query<AptSourcesQuery>,
) -> AppResult<String> {
    let (_, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    let text = DependencyGraph::resolved_apt_sources(
        &state.pool,
        version.id,
        query.unstable,
        query.internal,
        &state.config.aptly,
    )
    .await?;
    Ok(text)
}

/// GET /api/projects/{project}/{version}/dependents
pub async fn dependents(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((project_name, version_name)): Path<(String, String)>,
) -> AppResult<Json<Vec<ProjectVersionInfo>>> {
    let (_, version) = resolve_version(&state.pool, &project_name, &version_name).await?;
    let dependents = DependencyRepo::dependents(&state.pool, version.id, false).await?;
    Ok(Json(dependents))
}
