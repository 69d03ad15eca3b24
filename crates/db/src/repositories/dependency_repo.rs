//! Repository for dependency edges and transitive-closure traversal.

use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::dependency::{ClosureEntry, ProjectVersionDependency};
use crate::models::project_version::{DependencyPolicy, ProjectVersionInfo};

/// Defensive bound on closure traversal depth. The graph is kept
/// acyclic by `add_dependency`, so any chain deeper than this indicates
/// corrupted data rather than a legitimate dependency chain.
const MAX_CLOSURE_DEPTH: i32 = 64;

/// Policy-relevant fields of a version, used when re-validating policy
/// compatibility across a closure.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PolicyInfo {
    pub id: DbId,
    pub project_name: String,
    pub name: String,
    pub dependency_policy: DependencyPolicy,
    pub basemirror_id: Option<DbId>,
    pub basemirror_project_id: Option<DbId>,
}

/// Provides edge mutations and graph traversal queries.
pub struct DependencyRepo;

impl DependencyRepo {
    /// Direct dependency edges of a version.
    pub async fn direct_edges<'e, E>(
        executor: E,
        version_id: DbId,
    ) -> Result<Vec<ProjectVersionDependency>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectVersionDependency>(
            "SELECT projectversion_id, dependency_id, use_cibuilds
             FROM projectversion_dependencies
             WHERE projectversion_id = $1
             ORDER BY dependency_id",
        )
        .bind(version_id)
        .fetch_all(executor)
        .await
    }

    /// True if the ordered pair already has an edge.
    pub async fn edge_exists<'e, E>(
        executor: E,
        version_id: DbId,
        dependency_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM projectversion_dependencies
                 WHERE projectversion_id = $1 AND dependency_id = $2
             )",
        )
        .bind(version_id)
        .bind(dependency_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    /// Insert one edge. The primary key on the ordered pair surfaces a
    /// concurrent duplicate as a unique violation.
    pub async fn insert_edge<'e, E>(
        executor: E,
        version_id: DbId,
        dependency_id: DbId,
        use_cibuilds: bool,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO projectversion_dependencies
                 (projectversion_id, dependency_id, use_cibuilds)
             VALUES ($1, $2, $3)",
        )
        .bind(version_id)
        .bind(dependency_id)
        .bind(use_cibuilds)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Delete one edge. Returns `true` if it existed.
    pub async fn delete_edge(
        pool: &PgPool,
        version_id: DbId,
        dependency_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM projectversion_dependencies
             WHERE projectversion_id = $1 AND dependency_id = $2",
        )
        .bind(version_id)
        .bind(dependency_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Copy all edges of `from_version` onto `to_version`.
    ///
    /// `preserve_cibuilds` controls whether each edge's `use_cibuilds`
    /// flag is carried over or reset to false.
    pub async fn copy_edges<'e, E>(
        executor: E,
        from_version: DbId,
        to_version: DbId,
        preserve_cibuilds: bool,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO projectversion_dependencies
                 (projectversion_id, dependency_id, use_cibuilds)
             SELECT $2, dependency_id, use_cibuilds AND $3
             FROM projectversion_dependencies
             WHERE projectversion_id = $1",
        )
        .bind(from_version)
        .bind(to_version)
        .bind(preserve_cibuilds)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Full transitive dependency closure of a version, in BFS order.
    ///
    /// Each version appears once, keyed by the first (shallowest) edge
    /// reaching it; deeper re-discoveries are dropped.
    pub async fn transitive_closure<'e, E>(
        executor: E,
        version_id: DbId,
    ) -> Result<Vec<ClosureEntry>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows: Vec<(DbId, bool, i32)> = sqlx::query_as(
            "WITH RECURSIVE closure AS (
                 SELECT d.dependency_id, d.use_cibuilds, 1 AS depth
                 FROM projectversion_dependencies d
                 WHERE d.projectversion_id = $1
                 UNION ALL
                 SELECT d.dependency_id, d.use_cibuilds, c.depth + 1
                 FROM projectversion_dependencies d
                 JOIN closure c ON d.projectversion_id = c.dependency_id
                 WHERE c.depth < $2
             )
             SELECT dependency_id, use_cibuilds, depth
             FROM closure
             ORDER BY depth, dependency_id",
        )
        .bind(version_id)
        .bind(MAX_CLOSURE_DEPTH)
        .fetch_all(executor)
        .await?;

        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for (id, use_cibuilds, _depth) in rows {
            if seen.insert(id) {
                entries.push(ClosureEntry { version_id: id, use_cibuilds });
            }
        }
        Ok(entries)
    }

    /// Policy-relevant fields for a set of versions, basemirror project
    /// resolved in the same query.
    pub async fn policy_infos<'e, E>(
        executor: E,
        version_ids: &[DbId],
    ) -> Result<Vec<PolicyInfo>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, PolicyInfo>(
            "SELECT pv.id, p.name AS project_name, pv.name, pv.dependency_policy,
                    pv.basemirror_id, bm.project_id AS basemirror_project_id
             FROM projectversions pv
             JOIN projects p ON p.id = pv.project_id
             LEFT JOIN projectversions bm ON bm.id = pv.basemirror_id
             WHERE pv.id = ANY($1)",
        )
        .bind(version_ids)
        .fetch_all(executor)
        .await
    }

    /// Versions directly depending on `version_id` (the derived
    /// "dependents" view), optionally restricted to non-deleted ones.
    pub async fn dependents(
        pool: &PgPool,
        version_id: DbId,
        include_deleted: bool,
    ) -> Result<Vec<ProjectVersionInfo>, sqlx::Error> {
        let mut query = String::from(
            "SELECT pv.id, pv.project_id, p.name AS project_name, p.is_mirror,
                    pv.name, pv.description, pv.dependency_policy, pv.is_locked,
                    pv.ci_builds_enabled, pv.projectversiontype
             FROM projectversion_dependencies d
             JOIN projectversions pv ON pv.id = d.projectversion_id
             JOIN projects p ON p.id = pv.project_id
             WHERE d.dependency_id = $1",
        );
        if !include_deleted {
            query.push_str(" AND pv.is_deleted = FALSE");
        }
        query.push_str(" ORDER BY LOWER(p.name), LOWER(pv.name)");

        sqlx::query_as::<_, ProjectVersionInfo>(&query)
            .bind(version_id)
            .fetch_all(pool)
            .await
    }

    /// Direct dependencies of `version_id` as joined listing rows.
    pub async fn dependency_infos(
        pool: &PgPool,
        version_id: DbId,
        name_filter: Option<&str>,
    ) -> Result<Vec<ProjectVersionInfo>, sqlx::Error> {
        let mut query = String::from(
            "SELECT pv.id, pv.project_id, p.name AS project_name, p.is_mirror,
                    pv.name, pv.description, pv.dependency_policy, pv.is_locked,
                    pv.ci_builds_enabled, pv.projectversiontype
             FROM projectversion_dependencies d
             JOIN projectversions pv ON pv.id = d.dependency_id
             JOIN projects p ON p.id = pv.project_id
             WHERE d.projectversion_id = $1",
        );
        if name_filter.is_some() {
            query.push_str(" AND (p.name || '/' || pv.name) ILIKE '%' || $2 || '%'");
        }
        query.push_str(" ORDER BY LOWER(p.name), LOWER(pv.name)");

        let mut q = sqlx::query_as::<_, ProjectVersionInfo>(&query).bind(version_id);
        if let Some(filter) = name_filter {
            q = q.bind(filter);
        }
        q.fetch_all(pool).await
    }
}
