//! Repository for the `users` and `userroles` tables.

use packforge_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::User;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, email, is_admin, created_at";

/// Provides lookups backing authentication and the project role guard.
pub struct UserRepo;

impl UserRepo {
    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Insert a user if the username is free, returning the row either way.
    pub async fn upsert(
        pool: &PgPool,
        username: &str,
        password_hash: Option<&str>,
        email: Option<&str>,
        is_admin: bool,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, password_hash, email, is_admin)
             VALUES (LOWER($1), $2, $3, $4)
             ON CONFLICT ((LOWER(username))) DO UPDATE SET username = users.username
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(password_hash)
            .bind(email)
            .bind(is_admin)
            .fetch_one(pool)
            .await
    }

    /// The user's role within a project, if any.
    pub async fn project_role(
        pool: &PgPool,
        user_id: DbId,
        project_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT role FROM userroles WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(role,)| role))
    }

    /// Grant or change a user's role on a project.
    pub async fn set_project_role(
        pool: &PgPool,
        user_id: DbId,
        project_id: DbId,
        role: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO userroles (user_id, project_id, role)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, project_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(role)
        .execute(pool)
        .await?;
        Ok(())
    }
}
