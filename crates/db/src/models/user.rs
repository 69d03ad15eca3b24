//! User and per-project role models.

use packforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `users` table.
///
/// `password_hash` is only set for users managed by the static auth
/// backend; externally authenticated users carry `None`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: Timestamp,
}

/// A user's role within one project.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRole {
    pub user_id: DbId,
    pub project_id: DbId,
    pub role: String,
}
