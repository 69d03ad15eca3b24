//! Shared fixtures for database integration tests.
#![allow(dead_code)]

use packforge_core::types::DbId;
use packforge_db::models::project::{CreateProject, Project};
use packforge_db::models::project_version::{DependencyPolicy, ProjectVersion, VersionType};
use packforge_db::repositories::project_version_repo::NewVersionRow;
use packforge_db::repositories::{ProjectRepo, ProjectVersionRepo};
use sqlx::PgPool;

pub async fn create_project(pool: &PgPool, name: &str) -> Project {
    ProjectRepo::create(
        pool,
        &CreateProject {
            name: name.to_string(),
            description: None,
            is_mirror: false,
            is_basemirror: false,
        },
    )
    .await
    .expect("project insert")
}

pub async fn create_mirror_project(pool: &PgPool, name: &str, basemirror: bool) -> Project {
    ProjectRepo::create(
        pool,
        &CreateProject {
            name: name.to_string(),
            description: None,
            is_mirror: true,
            is_basemirror: basemirror,
        },
    )
    .await
    .expect("mirror project insert")
}

/// A basemirror project version with the given architectures.
pub async fn create_basemirror(
    pool: &PgPool,
    project_name: &str,
    version_name: &str,
    architectures: &[&str],
) -> ProjectVersion {
    let project = create_mirror_project(pool, project_name, true).await;
    let version = ProjectVersionRepo::insert(
        pool,
        &NewVersionRow {
            project_id: project.id,
            name: version_name.to_string(),
            description: None,
            dependency_policy: DependencyPolicy::Strict,
            basemirror_id: None,
            mirror_architectures: architectures.iter().map(|s| s.to_string()).collect(),
            is_locked: false,
            ci_builds_enabled: false,
            projectversiontype: VersionType::Normal,
            baseprojectversion_id: None,
        },
    )
    .await
    .expect("basemirror version insert");
    sqlx::query("UPDATE projectversions SET mirror_distribution = 'stable' WHERE id = $1")
        .bind(version.id)
        .execute(pool)
        .await
        .expect("mirror distribution update");
    version
}

/// A regular version in an existing project.
pub async fn create_version(
    pool: &PgPool,
    project_id: DbId,
    name: &str,
    policy: DependencyPolicy,
    basemirror_id: Option<DbId>,
) -> ProjectVersion {
    ProjectVersionRepo::insert(
        pool,
        &NewVersionRow {
            project_id,
            name: name.to_string(),
            description: None,
            dependency_policy: policy,
            basemirror_id,
            mirror_architectures: vec!["amd64".to_string()],
            is_locked: false,
            ci_builds_enabled: false,
            projectversiontype: VersionType::Normal,
            baseprojectversion_id: None,
        },
    )
    .await
    .expect("version insert")
}

pub async fn set_ci_builds(pool: &PgPool, version_id: DbId, enabled: bool) {
    sqlx::query("UPDATE projectversions SET ci_builds_enabled = $2 WHERE id = $1")
        .bind(version_id)
        .bind(enabled)
        .execute(pool)
        .await
        .expect("ci flag update");
}

pub async fn insert_source_repository(pool: &PgPool, name: &str) -> DbId {
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO sourcerepositories (url, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("https://git.example.com/{name}.git"))
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("source repository insert");
    id
}

pub async fn associate_repository(
    pool: &PgPool,
    repo_id: DbId,
    version_id: DbId,
    architectures: &[&str],
) -> DbId {
    let archs: Vec<String> = architectures.iter().map(|s| s.to_string()).collect();
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO sourcerepository_projectversions
             (sourcerepository_id, projectversion_id, architectures)
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(repo_id)
    .bind(version_id)
    .bind(&archs)
    .fetch_one(pool)
    .await
    .expect("association insert");
    id
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_build(
    pool: &PgPool,
    version_id: Option<DbId>,
    repo_id: Option<DbId>,
    parent_id: Option<DbId>,
    buildtype: &str,
    buildstate: &str,
    sourcename: &str,
    packages: &[&str],
) -> DbId {
    let packages = serde_json::json!(packages);
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO builds
             (projectversion_id, sourcerepository_id, parent_id, buildtype, buildstate,
              sourcename, version, debianpackages)
         VALUES ($1, $2, $3, $4::build_type, $5::build_state, $6, '1.0', $7) RETURNING id",
    )
    .bind(version_id)
    .bind(repo_id)
    .bind(parent_id)
    .bind(buildtype)
    .bind(buildstate)
    .bind(sourcename)
    .bind(packages)
    .fetch_one(pool)
    .await
    .expect("build insert");
    id
}

pub async fn insert_buildtask(pool: &PgPool, build_id: DbId) -> DbId {
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO buildtasks (build_id, task_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(build_id)
    .bind(uuid_like(build_id))
    .fetch_one(pool)
    .await
    .expect("buildtask insert");
    id
}

fn uuid_like(seed: DbId) -> String {
    format!("task-{seed:08}")
}

pub async fn count_edges(pool: &PgPool, version_id: DbId) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM projectversion_dependencies WHERE projectversion_id = $1",
    )
    .bind(version_id)
    .fetch_one(pool)
    .await
    .expect("edge count");
    count
}
