//! Version lifecycle operations: create, edit, clone, snapshot, lock,
//! delete.
//!
//! Each operation validates before mutating, runs its mutations inside
//! a transaction, and enqueues the matching repository work item.
//! `delete` deliberately commits its soft-delete marker separately from
//! the best-effort cascading cleanup (see [`VersionLifecycle::delete`]).

use packforge_core::config::BuildoutConfig;
use packforge_core::error::CoreError;
use packforge_core::naming;
use packforge_core::types::DbId;
use packforge_aptly::{AptlyQueue, AptlyTask};
use sqlx::PgPool;

use crate::error::{DbError, DbResult};
use crate::models::build::BuildState;
use crate::models::project_version::{
    CreateProjectVersion, EditProjectVersion, ProjectVersion, VersionType,
};
use crate::repositories::project_version_repo::NewVersionRow;
use crate::repositories::{
    BuildRepo, DependencyRepo, ProjectRepo, ProjectVersionRepo, SourceRepositoryRepo,
};

/// A resolved basemirror: the version row plus the names needed for
/// repository work items.
struct ResolvedBasemirror {
    version: ProjectVersion,
    project_name: String,
    version_name: String,
}

/// Orchestrates the multi-step lifecycle transitions of project
/// versions.
pub struct VersionLifecycle;

impl VersionLifecycle {
    /// Create a new version within a project.
    pub async fn create(
        pool: &PgPool,
        queue: &AptlyQueue,
        project_id: DbId,
        input: &CreateProjectVersion,
    ) -> DbResult<ProjectVersion> {
        naming::validate_name(&input.name)?;
        if input.architectures.is_empty() {
            return Err(CoreError::Validation("No valid architecture received".into()).into());
        }

        let project = ProjectRepo::find_by_id(pool, project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: project_id })?;
        if project.is_mirror {
            return Err(
                CoreError::Conflict("Cannot add a projectversion to a mirror".into()).into()
            );
        }

        Self::check_name_free(pool, project.id, &input.name).await?;
        let basemirror = Self::resolve_basemirror(pool, &input.basemirror).await?;
        Self::check_architectures(&input.architectures, &basemirror.version)?;

        let version = ProjectVersionRepo::insert(
            pool,
            &NewVersionRow {
                project_id: project.id,
                name: input.name.clone(),
                description: input.description.clone(),
                dependency_policy: input.dependency_policy,
                basemirror_id: Some(basemirror.version.id),
                mirror_architectures: input.architectures.clone(),
                is_locked: false,
                ci_builds_enabled: input.cibuilds,
                projectversiontype: VersionType::Normal,
                baseprojectversion_id: None,
            },
        )
        .await
        .map_err(|e| Self::map_duplicate(e, &input.name))?;

        queue.enqueue(AptlyTask::InitRepository {
            basemirror_project: basemirror.project_name,
            basemirror_version: basemirror.version_name,
            project: project.name.clone(),
            version: version.name.clone(),
            architectures: input.architectures.clone(),
        });

        tracing::info!(
            project = %project.name,
            version = %version.name,
            "Projectversion created",
        );
        Ok(version)
    }

    /// Edit description, dependency policy and CI flag of a version.
    ///
    /// A policy change is rejected when any non-deleted dependent would
    /// become inconsistent under the new policy.
    pub async fn edit(
        pool: &PgPool,
        version_id: DbId,
        input: &EditProjectVersion,
    ) -> DbResult<ProjectVersion> {
        let version = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;

        let own_basemirror_project = match version.basemirror_id {
            Some(bm_id) => ProjectVersionRepo::find_by_id(pool, bm_id)
                .await
                .map_err(DbError::Database)?
                .map(|bm| bm.project_id),
            None => None,
        };

        let dependents = DependencyRepo::dependents(pool, version_id, false)
            .await
            .map_err(DbError::Database)?;
        let dependent_ids: Vec<DbId> = dependents.iter().map(|d| d.id).collect();
        let infos = DependencyRepo::policy_infos(pool, &dependent_ids)
            .await
            .map_err(DbError::Database)?;
        for dependent in &infos {
            if !input.dependency_policy.compatible(
                version.basemirror_id,
                own_basemirror_project,
                dependent.basemirror_id,
                dependent.basemirror_project_id,
            ) {
                return Err(CoreError::Conflict(
                    "Cannot change dependency policy: dependents require a compatible basemirror"
                        .into(),
                )
                .into());
            }
        }

        ProjectVersionRepo::update_settings(
            pool,
            version_id,
            input.description.as_deref(),
            input.dependency_policy,
            input.cibuilds,
        )
        .await
        .map_err(DbError::Database)?
        .ok_or_else(|| {
            CoreError::NotFound { entity: "ProjectVersion", id: version_id }.into()
        })
    }

    /// Clone a version: new row carrying the source's dependency edges,
    /// architectures and source-repository associations.
    pub async fn clone(
        pool: &PgPool,
        queue: &AptlyQueue,
        version_id: DbId,
        input: &CreateProjectVersion,
    ) -> DbResult<ProjectVersion> {
        naming::validate_name(&input.name)?;

        let original = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        let project = ProjectRepo::find_by_id(pool, original.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: original.project_id })?;

        Self::check_name_free(pool, project.id, &input.name).await?;
        let basemirror = Self::resolve_basemirror(pool, &input.basemirror).await?;
        Self::check_architectures(&input.architectures, &basemirror.version)?;

        let mut tx = pool.begin().await.map_err(DbError::Database)?;
        let version = ProjectVersionRepo::insert(
            &mut *tx,
            &NewVersionRow {
                project_id: project.id,
                name: input.name.clone(),
                description: input.description.clone(),
                dependency_policy: input.dependency_policy,
                basemirror_id: Some(basemirror.version.id),
                mirror_architectures: input.architectures.clone(),
                is_locked: false,
                ci_builds_enabled: input.cibuilds,
                projectversiontype: VersionType::Normal,
                baseprojectversion_id: Some(original.id),
            },
        )
        .await
        .map_err(|e| Self::map_duplicate(e, &input.name))?;

        DependencyRepo::copy_edges(&mut *tx, original.id, version.id, true)
            .await
            .map_err(DbError::Database)?;
        SourceRepositoryRepo::copy_associations(&mut *tx, original.id, version.id)
            .await
            .map_err(DbError::Database)?;
        tx.commit().await.map_err(DbError::Database)?;

        queue.enqueue(AptlyTask::InitRepository {
            basemirror_project: basemirror.project_name,
            basemirror_version: basemirror.version_name,
            project: project.name.clone(),
            version: version.name.clone(),
            architectures: input.architectures.clone(),
        });

        tracing::info!(
            original_id = original.id,
            version = %version.name,
            "Projectversion cloned",
        );
        Ok(version)
    }

    /// Freeze a fully-locked dependency set into a new, locked snapshot
    /// version.
    pub async fn snapshot(
        pool: &PgPool,
        queue: &AptlyQueue,
        version_id: DbId,
        name: &str,
    ) -> DbResult<ProjectVersion> {
        let original = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        let project = ProjectRepo::find_by_id(pool, original.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: original.project_id })?;

        let basemirror = Self::basemirror_of(pool, &original).await?;
        if basemirror.version.external_repo {
            return Err(CoreError::Conflict(
                "Projectversion is based on external mirror".into(),
            )
            .into());
        }
        if matches!(
            original.projectversiontype,
            VersionType::Overlay | VersionType::Snapshot
        ) {
            return Err(CoreError::Conflict(
                "Projectversion is of type overlay/snapshot".into(),
            )
            .into());
        }

        naming::validate_name(name)?;
        Self::check_name_free(pool, project.id, name).await?;

        // Snapshots freeze a fully-locked dependency set.
        let dependencies = DependencyRepo::dependency_infos(pool, version_id, None)
            .await
            .map_err(DbError::Database)?;
        for dep in &dependencies {
            if !dep.is_locked {
                return Err(CoreError::Conflict(format!(
                    "Dependency '{}' is not locked",
                    dep.fullname()
                ))
                .into());
            }
        }

        // Every source repository's latest deb build must be successful
        // and have produced packages.
        let latest = BuildRepo::latest_deb_builds_per_repo(pool, version_id)
            .await
            .map_err(DbError::Database)?;
        let mut seen_sourcenames: Vec<&str> = Vec::new();
        for build in &latest {
            tracing::info!(
                sourcename = %build.sourcename,
                version = build.version.as_deref().unwrap_or("-"),
                buildstate = build.buildstate.as_str(),
                "snapshot: found latest build",
            );
            if build.buildstate != BuildState::Successful {
                return Err(CoreError::Conflict(
                    "Not all latest builds are successful".into(),
                )
                .into());
            }
            if seen_sourcenames.contains(&build.sourcename.as_str()) {
                tracing::warn!(
                    sourcename = %build.sourcename,
                    "snapshot: ignoring duplicate build sourcename",
                );
                continue;
            }
            seen_sourcenames.push(&build.sourcename);
            if !build.has_packages() {
                return Err(CoreError::Conflict(format!(
                    "No debian packages found for {}/{}",
                    build.sourcename,
                    build.version.as_deref().unwrap_or("-"),
                ))
                .into());
            }
        }

        let mut tx = pool.begin().await.map_err(DbError::Database)?;
        let version = ProjectVersionRepo::insert(
            &mut *tx,
            &NewVersionRow {
                project_id: project.id,
                name: name.to_string(),
                description: original.description.clone(),
                dependency_policy: original.dependency_policy,
                basemirror_id: original.basemirror_id,
                mirror_architectures: original.mirror_architectures.clone(),
                is_locked: true,
                ci_builds_enabled: false,
                projectversiontype: VersionType::Snapshot,
                baseprojectversion_id: Some(original.id),
            },
        )
        .await
        .map_err(|e| Self::map_duplicate(e, name))?;

        // TODO: decide whether snapshot edges should keep use_cibuilds;
        // the copy resets it to false for now.
        DependencyRepo::copy_edges(&mut *tx, original.id, version.id, false)
            .await
            .map_err(DbError::Database)?;
        SourceRepositoryRepo::copy_associations(&mut *tx, original.id, version.id)
            .await
            .map_err(DbError::Database)?;
        tx.commit().await.map_err(DbError::Database)?;

        queue.enqueue(AptlyTask::SnapshotRepository {
            basemirror_project: basemirror.project_name,
            basemirror_version: basemirror.version_name,
            project: project.name.clone(),
            version: original.name.clone(),
            architectures: original.mirror_architectures.clone(),
            new_version_name: version.name.clone(),
            old_version_id: original.id,
            new_version_id: version.id,
        });

        tracing::info!(
            original_id = original.id,
            snapshot = %version.name,
            "Projectversion snapshot created",
        );
        Ok(version)
    }

    /// Lock a version against further dependency and content changes.
    pub async fn lock(pool: &PgPool, version_id: DbId) -> DbResult<()> {
        let version = ProjectVersionRepo::find_by_id(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;

        let basemirror = Self::basemirror_of(pool, &version).await?;
        if basemirror.version.external_repo {
            return Err(CoreError::Conflict(
                "Projectversion is based on external mirror".into(),
            )
            .into());
        }

        ProjectVersionRepo::set_locked(pool, version_id, true)
            .await
            .map_err(DbError::Database)?;
        tracing::info!(version_id, "Projectversion locked");
        Ok(())
    }

    /// Delete a version: soft-delete marker first, then best-effort
    /// cascading cleanup, then the hard delete and the repository work
    /// item.
    ///
    /// The soft-delete commit stands on its own so the version
    /// disappears from active listings even if later cleanup fails; the
    /// cleanup steps are idempotent and a crashed delete can be re-run.
    pub async fn delete(
        pool: &PgPool,
        queue: &AptlyQueue,
        buildout: &BuildoutConfig,
        version_id: DbId,
        force: bool,
    ) -> DbResult<()> {
        let version = ProjectVersionRepo::find_by_id_include_deleted(pool, version_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: version_id })?;
        let project = ProjectRepo::find_by_id(pool, version.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: version.project_id })?;

        if !version.is_deleted {
            if version.is_locked {
                return Err(CoreError::Conflict("Projectversion is locked".into()).into());
            }

            let blocking = DependencyRepo::dependents(pool, version_id, false)
                .await
                .map_err(DbError::Database)?;
            if !blocking.is_empty() {
                let names: Vec<String> = blocking.iter().map(|d| d.fullname()).collect();
                tracing::error!(
                    version_id,
                    dependents = %names.join(", "),
                    "Projectversion delete blocked by dependents",
                );
                return Err(CoreError::Conflict(format!(
                    "Projectversions '{}' are still depending on this version, cannot delete it",
                    names.join(", ")
                ))
                .into());
            }

            if !force {
                let states = BuildRepo::active_deb_states(pool, version_id)
                    .await
                    .map_err(DbError::Database)?;
                if !states.is_empty() {
                    let states: Vec<&str> =
                        states.iter().map(|s| s.as_str()).collect();
                    return Err(CoreError::Conflict(format!(
                        "Builds in state {} are still depending on this version, cannot delete it",
                        states.join(", ")
                    ))
                    .into());
                }
            }
        }

        // Remember the repository coordinates before the rename below.
        let remembered_name = naming::original_name(&version.name).to_string();
        let basemirror = Self::basemirror_of(pool, &version).await?;

        // Soft-delete marker, committed on its own.
        if !version.is_deleted {
            ProjectVersionRepo::mark_deleted(pool, version_id, &naming::deleted_name(&version.name))
                .await
                .map_err(DbError::Database)?;
        }

        Self::cleanup_builds(pool, buildout, version_id).await?;

        SourceRepositoryRepo::delete_associations_and_hooks(pool, version_id)
            .await
            .map_err(DbError::Database)?;

        // Preserve clones and snapshots, sever their provenance.
        ProjectVersionRepo::clear_provenance(pool, version_id)
            .await
            .map_err(DbError::Database)?;

        ProjectVersionRepo::hard_delete(pool, version_id)
            .await
            .map_err(DbError::Database)?;

        queue.enqueue(AptlyTask::DeleteRepository {
            basemirror_project: basemirror.project_name,
            basemirror_version: basemirror.version_name,
            project: project.name.clone(),
            version: remembered_name,
            architectures: version.mirror_architectures.clone(),
        });

        tracing::info!(version_id, project = %project.name, "Projectversion deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Delete the version's deb builds, their shared source parents
    /// (only when no other version's build still hangs off them), their
    /// task rows and their buildout directories.
    async fn cleanup_builds(
        pool: &PgPool,
        buildout: &BuildoutConfig,
        version_id: DbId,
    ) -> DbResult<()> {
        let debs = BuildRepo::deb_builds_for_version(pool, version_id)
            .await
            .map_err(DbError::Database)?;

        let mut source_parents: Vec<DbId> = Vec::new();
        for deb in &debs {
            let Some(parent_id) = deb.parent_id else { continue };
            if source_parents.contains(&parent_id) {
                continue;
            }
            let children = BuildRepo::children_of(pool, parent_id)
                .await
                .map_err(DbError::Database)?;
            // A source build shared with another still-live version's
            // deb build must survive.
            if children
                .iter()
                .all(|child| child.projectversion_id == Some(version_id))
            {
                source_parents.push(parent_id);
            }
        }

        for build in &debs {
            Self::delete_build(pool, buildout, build.id).await?;
        }
        for parent_id in source_parents {
            Self::delete_build(pool, buildout, parent_id).await?;
        }
        Ok(())
    }

    async fn delete_build(
        pool: &PgPool,
        buildout: &BuildoutConfig,
        build_id: DbId,
    ) -> DbResult<()> {
        BuildRepo::delete_with_tasks(pool, build_id)
            .await
            .map_err(DbError::Database)?;

        // Stray output directories are not worth failing a delete over.
        let dir = buildout.build_dir(build_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::debug!(build_id, dir = %dir.display(), error = %e, "Buildout removal skipped");
        }
        Ok(())
    }

    /// The version's basemirror with the names needed for work items.
    async fn basemirror_of(
        pool: &PgPool,
        version: &ProjectVersion,
    ) -> DbResult<ResolvedBasemirror> {
        let bm_id = version.basemirror_id.ok_or_else(|| {
            CoreError::Validation("Projectversion has no basemirror".into())
        })?;
        let bm = ProjectVersionRepo::find_by_id(pool, bm_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "ProjectVersion", id: bm_id })?;
        let bm_project = ProjectRepo::find_by_id(pool, bm.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: bm.project_id })?;
        Ok(ResolvedBasemirror {
            project_name: bm_project.name,
            version_name: bm.name.clone(),
            version: bm,
        })
    }

    /// Resolve a `"project/version"` basemirror reference and verify it
    /// belongs to a basemirror project.
    async fn resolve_basemirror(pool: &PgPool, reference: &str) -> DbResult<ResolvedBasemirror> {
        let (project_name, version_name) = naming::parse_version_ref(reference)?;
        let bm = ProjectVersionRepo::find_by_fullname(pool, project_name, version_name)
            .await
            .map_err(DbError::Database)?
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Base mirror not found: {project_name}/{version_name}"
                ))
            })?;
        let bm_project = ProjectRepo::find_by_id(pool, bm.project_id)
            .await
            .map_err(DbError::Database)?
            .ok_or(CoreError::NotFound { entity: "Project", id: bm.project_id })?;
        if !bm_project.is_basemirror {
            return Err(CoreError::Validation(format!(
                "Project '{}' is not a basemirror",
                bm_project.name
            ))
            .into());
        }
        Ok(ResolvedBasemirror {
            project_name: bm_project.name,
            version_name: bm.name.clone(),
            version: bm,
        })
    }

    /// Reject when the name is already taken within the project,
    /// including by a soft-deleted version.
    async fn check_name_free(pool: &PgPool, project_id: DbId, name: &str) -> DbResult<()> {
        if let Some(existing) = ProjectVersionRepo::find_in_project(pool, project_id, name)
            .await
            .map_err(DbError::Database)?
        {
            let hint = if existing.is_deleted { ", and is marked as deleted" } else { "" };
            return Err(CoreError::Conflict(format!(
                "Projectversion '{name}' already exists{hint}"
            ))
            .into());
        }
        Ok(())
    }

    /// Requested architectures must be a subset of the basemirror's.
    fn check_architectures(
        architectures: &[String],
        basemirror: &ProjectVersion,
    ) -> DbResult<()> {
        for arch in architectures {
            if !basemirror.mirror_architectures.contains(arch) {
                return Err(CoreError::Validation(format!(
                    "Architecture not found in basemirror: {arch}"
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Map a unique-constraint violation on insert to the name conflict
    /// it represents (two concurrent creates racing on one name).
    fn map_duplicate(e: sqlx::Error, name: &str) -> DbError {
        let err = DbError::Database(e);
        if err.is_unique_violation() {
            DbError::Core(CoreError::Conflict(format!(
                "Projectversion '{name}' already exists"
            )))
        } else {
            err
        }
    }
}
