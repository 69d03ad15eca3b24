//! Dependency graph engine.
//!
//! Validates and mutates dependency edges between project versions and
//! computes candidate sets, transitive closures and resolved apt
//! sources. All graph reads and mutations of one operation run inside a
//! single transaction, so readers never observe a partially-applied
//! add or remove.

use packforge_core::aptsources::{self, AptRepoSource, ResolvedSource};
use packforge_core::config::AptlyConfig;
use packforge_core::error::CoreError;
use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::error::{DbError, DbResult};
use crate::models::dependency::ClosureEntry;
use crate::models::project::Project;
use crate::models::project_version::{DependencyPolicy, ProjectVersion, ProjectVersionInfo};
use crate::repositories::{DependencyRepo, ProjectRepo, ProjectVersionRepo};

/// A version loaded together with its owning project and the project id
/// of its basemirror, as needed by policy checks.
struct VersionCtx {
    version: ProjectVersion,
    project: Project,
    basemirror_project_id: Option<DbId>,
}

/// Graph queries and edge mutations over project versions.
pub struct DependencyGraph;

impl DependencyGraph {
    /// Add a dependency edge `version -> dependency`.
    ///
    /// Preconditions are checked in order; the first failure wins. The
    /// transitive closure of the dependency is validated both for
    /// cycles and for deep policy consistency. Mirrors never serve CI
    /// builds, so `use_cibuilds` is forced off for mirror dependencies.
    pub async fn add_dependency(
        pool: &PgPool,
        version_id: DbId,
        dependency_id: DbId,
        use_cibuilds: bool,
    ) -> DbResult<()> {
        let mut tx = pool.begin().await.map_err(DbError::Database)?;

        let ctx = Self::load_version_ctx(&mut tx, version_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        if ctx.project.is_mirror {
            return Err(CoreError::Conflict(
                "Cannot add dependencies to a project which is a mirror".into(),
            )
            .into());
        }
        if ctx.version.is_locked {
            return Err(CoreError::Conflict(
                "Cannot add dependencies on a locked projectversion".into(),
            )
            .into());
        }

        let dep_ctx = Self::load_version_ctx(&mut tx, dependency_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: dependency_id })?;
        if dep_ctx.version.id == ctx.version.id {
            return Err(CoreError::Conflict(
                "Cannot add a dependency of the projectversion to itself".into(),
            )
            .into());
        }
        if dep_ctx.project.is_basemirror {
            return Err(CoreError::Conflict(
                "Cannot add a dependency which is a basemirror".into(),
            )
            .into());
        }

        if !dep_ctx.version.dependency_policy.compatible(
            dep_ctx.version.basemirror_id,
            dep_ctx.basemirror_project_id,
            ctx.version.basemirror_id,
            ctx.basemirror_project_id,
        ) {
            return Err(policy_conflict(dep_ctx.version.dependency_policy).into());
        }

        // Cycle and deep policy check over the dependency's closure.
        let closure = DependencyRepo::transitive_closure(&mut *tx, dependency_id)
            .await
            .map_err(DbError::Database)?;
        if closure.iter().any(|entry| entry.version_id == version_id) {
            return Err(CoreError::Conflict(
                "Cannot add a dependency of a projectversion depending itself on this projectversion"
                    .into(),
            )
            .into());
        }
        if DependencyRepo::edge_exists(&mut *tx, version_id, dependency_id)
            .await
            .map_err(DbError::Database)?
        {
            return Err(CoreError::Conflict("Dependency already exists".into()).into());
        }

        let closure_ids: Vec<DbId> = closure.iter().map(|e| e.version_id).collect();
        let members = DependencyRepo::policy_infos(&mut *tx, &closure_ids)
            .await
            .map_err(DbError::Database)?;
        for member in &members {
            if !member.dependency_policy.compatible(
                member.basemirror_id,
                member.basemirror_project_id,
                dep_ctx.version.basemirror_id,
                dep_ctx.basemirror_project_id,
            ) {
                return Err(policy_conflict(member.dependency_policy).into());
            }
        }

        // Mirrors never serve CI builds.
        let use_cibuilds = if dep_ctx.project.is_mirror { false } else { use_cibuilds };

        DependencyRepo::insert_edge(&mut *tx, version_id, dependency_id, use_cibuilds)
            .await
            .map_err(|e| {
                let err = DbError::Database(e);
                if err.is_unique_violation() {
                    DbError::Core(CoreError::Conflict("Dependency already exists".into()))
                } else {
                    err
                }
            })?;

        tx.commit().await.map_err(DbError::Database)?;
        tracing::info!(version_id, dependency_id, use_cibuilds, "Dependency added");
        Ok(())
    }

    /// Remove the dependency edge `version -> dependency`.
    pub async fn remove_dependency(
        pool: &PgPool,
        version_id: DbId,
        dependency_id: DbId,
    ) -> DbResult<()> {
        let version = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        if version.is_locked {
            return Err(CoreError::Conflict("Projectversion is locked".into()).into());
        }

        let removed = DependencyRepo::delete_edge(pool, version_id, dependency_id)
            .await
            .map_err(DbError::Database)?;
        if !removed {
            return Err(CoreError::Conflict("Dependency not found".into()).into());
        }
        tracing::info!(version_id, dependency_id, "Dependency removed");
        Ok(())
    }

    /// Versions eligible as new dependencies of `version_id`.
    ///
    /// Union of: versions sharing the basemirror, distribution-policy
    /// versions on a sibling basemirror of the same distribution, and
    /// any-policy versions. Existing dependencies and the version itself
    /// are excluded; ordered by mirror flag, then project name, then
    /// version name (both case-insensitive).
    pub async fn candidates(
        pool: &PgPool,
        version_id: DbId,
        name_filter: Option<&str>,
    ) -> DbResult<Vec<ProjectVersionInfo>> {
        let version = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;

        let basemirror_project_id = match version.basemirror_id {
            Some(bm_id) => ProjectVersionRepo::find_by_id(pool, bm_id)
                .await
                .map_err(DbError::Database)?
                .map(|bm| bm.project_id),
            None => None,
        };

        let mut query = String::from(
            "SELECT pv.id, pv.project_id, p.name AS project_name, p.is_mirror,
                    pv.name, pv.description, pv.dependency_policy, pv.is_locked,
                    pv.ci_builds_enabled, pv.projectversiontype
             FROM projectversions pv
             JOIN projects p ON p.id = pv.project_id
             LEFT JOIN projectversions bm ON bm.id = pv.basemirror_id
             WHERE pv.id <> $1
               AND pv.is_deleted = FALSE
               AND NOT EXISTS (
                   SELECT 1 FROM projectversion_dependencies d
                   WHERE d.projectversion_id = $1 AND d.dependency_id = pv.id
               )
               AND (
                   pv.basemirror_id IS NOT DISTINCT FROM $2
                   OR (pv.dependency_policy = 'distribution'
                       AND bm.project_id IS NOT DISTINCT FROM $3
                       AND pv.basemirror_id IS DISTINCT FROM $2)
                   OR pv.dependency_policy = 'any'
               )",
        );
        if name_filter.is_some() {
            query.push_str(" AND (p.name || '/' || pv.name) ILIKE '%' || $4 || '%'");
        }
        query.push_str(" ORDER BY p.is_mirror, LOWER(p.name), LOWER(pv.name)");

        let mut q = sqlx::query_as::<_, ProjectVersionInfo>(&query)
            .bind(version_id)
            .bind(version.basemirror_id)
            .bind(basemirror_project_id);
        if let Some(filter) = name_filter {
            q = q.bind(filter);
        }
        q.fetch_all(pool).await.map_err(DbError::Database)
    }

    /// Render the apt sources text for a version and its resolved
    /// transitive dependency set.
    ///
    /// The version's basemirror line comes first (unless the owning
    /// project is itself a basemirror), then the version's own line,
    /// then the closure in traversal order. Unstable-channel lines are
    /// added when requested and both the consuming edge and the
    /// producing version opt in.
    pub async fn resolved_apt_sources(
        pool: &PgPool,
        version_id: DbId,
        unstable: bool,
        internal: bool,
        config: &AptlyConfig,
    ) -> DbResult<String> {
        let version = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        let project = ProjectRepo::find_by_id(pool, version.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: version.project_id })?;

        // The version itself, paired with its own CI flag, then the
        // transitive closure in traversal order.
        let mut entries = vec![ClosureEntry {
            version_id: version.id,
            use_cibuilds: version.ci_builds_enabled,
        }];
        entries.extend(
            DependencyRepo::transitive_closure(pool, version_id)
                .await
                .map_err(DbError::Database)?,
        );

        let ids: Vec<DbId> = entries.iter().map(|e| e.version_id).collect();
        let rows = Self::apt_source_rows(pool, &ids).await?;

        let mut sources = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(row) = rows.iter().find(|r| r.id == entry.version_id) else {
                tracing::error!(version_id = entry.version_id, "Resolved source not found");
                continue;
            };
            sources.push(ResolvedSource {
                source: row.to_source(),
                with_unstable: unstable && entry.use_cibuilds && row.ci_builds_enabled,
            });
        }

        let basemirror = match (project.is_basemirror, version.basemirror_id) {
            (false, Some(bm_id)) => {
                let rows = Self::apt_source_rows(pool, &[bm_id]).await?;
                rows.first().map(|r| r.to_source())
            }
            _ => None,
        };

        Ok(aptsources::render_sources_list(
            &project.name,
            &version.name,
            config.base_url(internal),
            &config.key_url(internal),
            basemirror.as_ref(),
            &sources,
        ))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn load_version_ctx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        version_id: DbId,
    ) -> DbResult<Option<VersionCtx>> {
        let Some(version) = ProjectVersionRepo::find_by_id(&mut **tx, version_id)
            .await
            .map_err(DbError::Database)?
        else {
            return Ok(None);
        };
        let project = ProjectRepo::find_by_id(&mut **tx, version.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: version.project_id })?;
        let basemirror_project_id = match version.basemirror_id {
            Some(bm_id) => ProjectVersionRepo::find_by_id(&mut **tx, bm_id)
                .await
                .map_err(DbError::Database)?
                .map(|bm| bm.project_id),
            None => None,
        };
        Ok(Some(VersionCtx { version, project, basemirror_project_id }))
    }

    async fn apt_source_rows(pool: &PgPool, ids: &[DbId]) -> DbResult<Vec<AptSourceRow>> {
        sqlx::query_as::<_, AptSourceRow>(
            "SELECT pv.id, p.name AS project_name, pv.name, p.is_basemirror,
                    pv.external_repo, pv.mirror_url, pv.mirror_distribution,
                    pv.mirror_components, pv.ci_builds_enabled
             FROM projectversions pv
             JOIN projects p ON p.id = pv.project_id
             WHERE pv.id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(DbError::Database)
    }
}

/// Fields needed to render one version's apt repository line.
#[derive(Debug, sqlx::FromRow)]
struct AptSourceRow {
    id: DbId,
    project_name: String,
    name: String,
    is_basemirror: bool,
    external_repo: bool,
    mirror_url: Option<String>,
    mirror_distribution: Option<String>,
    mirror_components: Option<Vec<String>>,
    ci_builds_enabled: bool,
}

impl AptSourceRow {
    fn to_source(&self) -> AptRepoSource {
        AptRepoSource {
            project_name: self.project_name.clone(),
            version_name: self.name.clone(),
            is_basemirror: self.is_basemirror,
            external_repo: self.external_repo,
            mirror_url: self.mirror_url.clone(),
            mirror_distribution: self.mirror_distribution.clone(),
            mirror_components: self.mirror_components.clone(),
        }
    }
}

/// The conflict produced by a policy mismatch, phrased per policy.
fn policy_conflict(policy: DependencyPolicy) -> CoreError {
    match policy {
        DependencyPolicy::Strict => CoreError::Conflict(
            "Cannot add a dependency with different basemirror as per dependency policy".into(),
        ),
        DependencyPolicy::Distribution => CoreError::Conflict(
            "Cannot add a dependency from different distribution as per dependency policy".into(),
        ),
        DependencyPolicy::Any => {
            CoreError::Internal("Policy 'any' cannot produce a mismatch".into())
        }
    }
}
