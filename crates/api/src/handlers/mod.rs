//! HTTP handlers. Thin: validation and authorization up front, then a
//! repository / graph / lifecycle call.

pub mod auth;
pub mod dependency;
pub mod permissions;
pub mod project;
pub mod project_version;
pub mod source_repository;

use packforge_core::error::CoreError;
use packforge_db::models::project::Project;
use packforge_db::models::project_version::ProjectVersion;
use packforge_db::repositories::{ProjectRepo, ProjectVersionRepo};
use packforge_db::DbPool;

use crate::error::AppError;

/// Resolve a project path segment to its row.
pub async fn project_by_name(pool: &DbPool, project_name: &str) -> Result<Project, AppError> {
    ProjectRepo::find_by_name(pool, project_name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Project '{project_name}' could not be found"
            )))
        })
}

/// Resolve a `{project}/{version}` path pair to the project and its
/// active version.
pub async fn resolve_version(
    pool: &DbPool,
    project_name: &str,
    version_name: &str,
) -> Result<(Project, ProjectVersion), AppError> {
    let project = ProjectRepo::find_by_name(pool, project_name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Project '{project_name}' could not be found"
            )))
        })?;
    let version = ProjectVersionRepo::find_by_fullname(pool, project_name, version_name)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Projectversion '{project_name}/{version_name}' could not be found"
            )))
        })?;
    Ok((project, version))
}
