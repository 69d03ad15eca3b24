//! Repository for source repositories, their per-version associations
//! and post-build hooks.

use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::source_repository::{SourceRepoAssociation, SourceRepository};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, url, name, state, created_at, updated_at";

/// Provides association and hook management for source repositories.
pub struct SourceRepositoryRepo;

impl SourceRepositoryRepo {
    /// Find a source repository by its internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SourceRepository>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sourcerepositories WHERE id = $1");
        sqlx::query_as::<_, SourceRepository>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All associations of a version, with their architecture subsets.
    pub async fn associations_for_version(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Vec<SourceRepoAssociation>, sqlx::Error> {
        sqlx::query_as::<_, SourceRepoAssociation>(
            "SELECT id, sourcerepository_id, projectversion_id, architectures
             FROM sourcerepository_projectversions
             WHERE projectversion_id = $1
             ORDER BY sourcerepository_id",
        )
        .bind(version_id)
        .fetch_all(pool)
        .await
    }

    /// Copy every association of `from_version` onto `to_version`,
    /// including each association's architecture subset.
    pub async fn copy_associations<'e, E>(
        executor: E,
        from_version: DbId,
        to_version: DbId,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO sourcerepository_projectversions
                 (sourcerepository_id, projectversion_id, architectures)
             SELECT sourcerepository_id, $2, architectures
             FROM sourcerepository_projectversions
             WHERE projectversion_id = $1",
        )
        .bind(from_version)
        .bind(to_version)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove one association. Returns `true` if it existed.
    pub async fn remove_association(
        pool: &PgPool,
        source_repository_id: DbId,
        version_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sourcerepository_projectversions
             WHERE sourcerepository_id = $1 AND projectversion_id = $2",
        )
        .bind(source_repository_id)
        .bind(version_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every association scoped to a version, and every hook
    /// scoped to those associations. Idempotent.
    pub async fn delete_associations_and_hooks(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query(
            "DELETE FROM postbuildhooks
             WHERE sourcerepositoryprojectversion_id IN (
                 SELECT id FROM sourcerepository_projectversions
                 WHERE projectversion_id = $1
             )",
        )
        .bind(version_id)
        .execute(pool)
        .await?;

        let result = sqlx::query(
            "DELETE FROM sourcerepository_projectversions WHERE projectversion_id = $1",
        )
        .bind(version_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
