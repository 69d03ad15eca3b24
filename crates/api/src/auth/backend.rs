//! Pluggable authentication backend.
//!
//! The backend is chosen once at startup from the `AUTH_BACKEND`
//! configuration key and injected as a trait object; swapping backends
//! requires a restart. User management is optional per backend and
//! exposed through explicit capability probes, so callers never test
//! for method presence.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use packforge_core::types::DbId;
use packforge_db::repositories::UserRepo;
use packforge_db::DbPool;

/// Authentication strategy.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Verify credentials; `true` means authenticated.
    async fn login(&self, username: &str, password: &str) -> anyhow::Result<bool>;

    /// Whether this backend manages its own user records.
    fn can_manage_users(&self) -> bool {
        false
    }

    /// Create a user. Only valid when [`can_manage_users`](Self::can_manage_users)
    /// returns `true`.
    async fn add_user(
        &self,
        _username: &str,
        _password: &str,
        _email: Option<&str>,
        _is_admin: bool,
    ) -> anyhow::Result<DbId> {
        anyhow::bail!("auth backend does not support user management")
    }

    /// Delete a user. Only valid when [`can_manage_users`](Self::can_manage_users)
    /// returns `true`.
    async fn delete_user(&self, _user_id: DbId) -> anyhow::Result<()> {
        anyhow::bail!("auth backend does not support user management")
    }
}

/// Select the configured backend. Unknown names fail startup.
pub fn select_backend(name: &str, pool: DbPool) -> anyhow::Result<Box<dyn AuthBackend>> {
    match name {
        "static" => Ok(Box::new(StaticAuthBackend { pool })),
        other => anyhow::bail!("unknown auth backend: {other}"),
    }
}

/// Backend authenticating against password hashes in the `users` table.
pub struct StaticAuthBackend {
    pool: DbPool,
}

#[async_trait]
impl AuthBackend for StaticAuthBackend {
    async fn login(&self, username: &str, password: &str) -> anyhow::Result<bool> {
        let Some(user) = UserRepo::find_by_username(&self.pool, username).await? else {
            return Ok(false);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(false);
        };
        let parsed = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("corrupt password hash for {username}: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn can_manage_users(&self) -> bool {
        true
    }

    async fn add_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        is_admin: bool,
    ) -> anyhow::Result<DbId> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
            .to_string();
        let user = UserRepo::upsert(&self.pool, username, Some(&hash), email, is_admin).await?;
        Ok(user.id)
    }

    async fn delete_user(&self, user_id: DbId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
