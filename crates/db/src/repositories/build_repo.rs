//! Repository for the `builds` and `buildtasks` tables.

use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::build::{Build, BuildState};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, parent_id, projectversion_id, sourcerepository_id, buildtype, \
    buildstate, sourcename, version, architecture, debianpackages, started_at, finished_at, \
    created_at";

/// Prefixed column list for joined queries.
const B_COLUMNS: &str = "b.id, b.parent_id, b.projectversion_id, b.sourcerepository_id, \
    b.buildtype, b.buildstate, b.sourcename, b.version, b.architecture, b.debianpackages, \
    b.started_at, b.finished_at, b.created_at";

/// Provides queries and cleanup mutations for builds.
pub struct BuildRepo;

impl BuildRepo {
    /// Find a build by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Build>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM builds WHERE id = $1");
        sqlx::query_as::<_, Build>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The current state of a build, if the build exists.
    pub async fn buildstate(pool: &PgPool, id: DbId) -> Result<Option<BuildState>, sqlx::Error> {
        let row: Option<(BuildState,)> =
            sqlx::query_as("SELECT buildstate FROM builds WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(state,)| state))
    }

    /// Distinct non-terminal states among a version's deb builds.
    ///
    /// Non-empty means the version has builds in flight and must not be
    /// deleted without force.
    pub async fn active_deb_states(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Vec<BuildState>, sqlx::Error> {
        let rows: Vec<(BuildState,)> = sqlx::query_as(
            "SELECT DISTINCT buildstate FROM builds
             WHERE projectversion_id = $1
               AND buildtype = 'deb'
               AND buildstate IN
                   ('needs_build', 'scheduled', 'building', 'needs_publish', 'publishing')",
        )
        .bind(version_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(state,)| state).collect())
    }

    /// All deb builds belonging to a version.
    pub async fn deb_builds_for_version(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Vec<Build>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM builds
             WHERE projectversion_id = $1 AND buildtype = 'deb'
             ORDER BY id"
        );
        sqlx::query_as::<_, Build>(&query)
            .bind(version_id)
            .fetch_all(pool)
            .await
    }

    /// All children of a parent build.
    pub async fn children_of(pool: &PgPool, parent_id: DbId) -> Result<Vec<Build>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM builds WHERE parent_id = $1 ORDER BY id");
        sqlx::query_as::<_, Build>(&query)
            .bind(parent_id)
            .fetch_all(pool)
            .await
    }

    /// The latest (maximum id) deb build of each source repository of a
    /// version, ordered by sourcename then descending build id.
    ///
    /// This is the candidate set a snapshot freezes.
    pub async fn latest_deb_builds_per_repo(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Vec<Build>, sqlx::Error> {
        let query = format!(
            "SELECT {B_COLUMNS}
             FROM builds b
             JOIN (
                 SELECT MAX(id) AS latest_id
                 FROM builds
                 WHERE projectversion_id = $1 AND buildtype = 'deb'
                 GROUP BY sourcerepository_id
             ) latest ON latest.latest_id = b.id
             ORDER BY b.sourcename, b.id DESC"
        );
        sqlx::query_as::<_, Build>(&query)
            .bind(version_id)
            .fetch_all(pool)
            .await
    }

    /// Delete a build's task rows, then the build row itself.
    ///
    /// Idempotent: deleting an already-absent build is a no-op.
    pub async fn delete_with_tasks(pool: &PgPool, build_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM buildtasks WHERE build_id = $1")
            .bind(build_id)
            .execute(pool)
            .await?;
        let result = sqlx::query("DELETE FROM builds WHERE id = $1")
            .bind(build_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
