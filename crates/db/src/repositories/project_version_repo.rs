//! Repository for the `projectversions` table.

use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::project_version::{
    DependencyPolicy, ProjectVersion, ProjectVersionInfo, VersionType,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, name, description, dependency_policy, basemirror_id, \
    mirror_architectures, is_locked, is_deleted, ci_builds_enabled, projectversiontype, \
    baseprojectversion_id, mirror_state, external_repo, mirror_url, mirror_distribution, \
    mirror_components, created_at, updated_at";

/// Prefixed column list for joined queries.
const PV_COLUMNS: &str = "pv.id, pv.project_id, pv.name, pv.description, pv.dependency_policy, \
    pv.basemirror_id, pv.mirror_architectures, pv.is_locked, pv.is_deleted, \
    pv.ci_builds_enabled, pv.projectversiontype, pv.baseprojectversion_id, pv.mirror_state, \
    pv.external_repo, pv.mirror_url, pv.mirror_distribution, pv.mirror_components, \
    pv.created_at, pv.updated_at";

/// Column list for [`ProjectVersionInfo`] listings.
const INFO_COLUMNS: &str = "pv.id, pv.project_id, p.name AS project_name, p.is_mirror, \
    pv.name, pv.description, pv.dependency_policy, pv.is_locked, pv.ci_builds_enabled, \
    pv.projectversiontype";

/// All fields needed to insert a version row. Shared by create, clone
/// and snapshot.
#[derive(Debug, Clone)]
pub struct NewVersionRow {
    pub project_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub dependency_policy: DependencyPolicy,
    pub basemirror_id: Option<DbId>,
    pub mirror_architectures: Vec<String>,
    pub is_locked: bool,
    pub ci_builds_enabled: bool,
    pub projectversiontype: VersionType,
    pub baseprojectversion_id: Option<DbId>,
}

/// Provides queries and mutations for project versions.
pub struct ProjectVersionRepo;

impl ProjectVersionRepo {
    /// Find an active (non-deleted) version by its internal ID.
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<ProjectVersion>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query =
            format!("SELECT {COLUMNS} FROM projectversions WHERE id = $1 AND is_deleted = FALSE");
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a version by ID, including soft-deleted rows.
    ///
    /// Used by the delete state machine so an interrupted cleanup can be
    /// re-run on an already soft-deleted version.
    pub async fn find_by_id_include_deleted(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProjectVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projectversions WHERE id = $1");
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resolve a `"project/version"` pair to an active version
    /// (case-insensitive on both parts).
    pub async fn find_by_fullname(
        pool: &PgPool,
        project_name: &str,
        version_name: &str,
    ) -> Result<Option<ProjectVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {PV_COLUMNS} FROM projectversions pv
             JOIN projects p ON p.id = pv.project_id
             WHERE LOWER(p.name) = LOWER($1)
               AND LOWER(pv.name) = LOWER($2)
               AND pv.is_deleted = FALSE"
        );
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(project_name)
            .bind(version_name)
            .fetch_optional(pool)
            .await
    }

    /// Find a version by name within a project (case-insensitive),
    /// including soft-deleted rows.
    ///
    /// Name uniqueness spans deleted rows, so callers can report that a
    /// name is taken by a deleted version.
    pub async fn find_in_project<'e, E>(
        executor: E,
        project_id: DbId,
        name: &str,
    ) -> Result<Option<ProjectVersion>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM projectversions
             WHERE project_id = $1 AND LOWER(name) = LOWER($2)"
        );
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(project_id)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// List active versions of a project, newest first, with an optional
    /// case-insensitive name filter.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        name_filter: Option<&str>,
    ) -> Result<Vec<ProjectVersionInfo>, sqlx::Error> {
        let mut query = format!(
            "SELECT {INFO_COLUMNS} FROM projectversions pv
             JOIN projects p ON p.id = pv.project_id
             WHERE pv.project_id = $1 AND pv.is_deleted = FALSE"
        );
        if name_filter.is_some() {
            query.push_str(" AND pv.name ILIKE '%' || $2 || '%'");
        }
        query.push_str(" ORDER BY pv.id DESC");

        let mut q = sqlx::query_as::<_, ProjectVersionInfo>(&query).bind(project_id);
        if let Some(filter) = name_filter {
            q = q.bind(filter);
        }
        q.fetch_all(pool).await
    }

    /// Insert a new version row.
    pub async fn insert<'e, E>(executor: E, row: &NewVersionRow) -> Result<ProjectVersion, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO projectversions
                (project_id, name, description, dependency_policy, basemirror_id,
                 mirror_architectures, is_locked, ci_builds_enabled, projectversiontype,
                 baseprojectversion_id, mirror_state)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NULL)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(row.project_id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(row.dependency_policy)
            .bind(row.basemirror_id)
            .bind(&row.mirror_architectures)
            .bind(row.is_locked)
            .bind(row.ci_builds_enabled)
            .bind(row.projectversiontype)
            .bind(row.baseprojectversion_id)
            .fetch_one(executor)
            .await
    }

    /// Update description, dependency policy and CI flag.
    pub async fn update_settings(
        pool: &PgPool,
        id: DbId,
        description: Option<&str>,
        policy: DependencyPolicy,
        ci_builds_enabled: bool,
    ) -> Result<Option<ProjectVersion>, sqlx::Error> {
        let query = format!(
            "UPDATE projectversions
             SET description = $2, dependency_policy = $3, ci_builds_enabled = $4,
                 updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectVersion>(&query)
            .bind(id)
            .bind(description)
            .bind(policy)
            .bind(ci_builds_enabled)
            .fetch_optional(pool)
            .await
    }

    /// Set the locked flag. Returns `true` if a row was updated.
    pub async fn set_locked(pool: &PgPool, id: DbId, locked: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projectversions SET is_locked = $2, updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(locked)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete marker: deleted + locked + CI off + renamed.
    ///
    /// Committed on its own so the version disappears from active
    /// listings even if later cleanup fails.
    pub async fn mark_deleted(
        pool: &PgPool,
        id: DbId,
        new_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projectversions
             SET is_deleted = TRUE, is_locked = TRUE, ci_builds_enabled = FALSE,
                 name = $2, updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(new_name)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sever provenance: null `baseprojectversion_id` on every clone or
    /// snapshot of this version.
    pub async fn clear_provenance(pool: &PgPool, id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projectversions SET baseprojectversion_id = NULL
             WHERE baseprojectversion_id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Permanently delete a version row.
    pub async fn hard_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projectversions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
