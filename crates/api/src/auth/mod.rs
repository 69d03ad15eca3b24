//! Authentication and authorization.
//!
//! [`AuthUser`] extracts and verifies the bearer token; handlers then
//! call [`require_project_role`] explicitly with the resolved project
//! id before running a mutating operation. Core components never
//! re-derive permissions themselves.

pub mod backend;
pub mod jwt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use packforge_core::error::CoreError;
use packforge_core::types::DbId;
use packforge_db::repositories::UserRepo;
use packforge_db::DbPool;

use crate::error::AppError;
use crate::state::AppState;

pub use backend::{select_backend, AuthBackend};

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub username: String,
    pub is_admin: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing authorization header".into()))
            })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Invalid authorization header".into()))
        })?;

        let claims = jwt::verify_token(&state.config.jwt, token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
            is_admin: claims.is_admin,
        })
    }
}

/// Authorization guard: the caller must hold one of `roles` on the
/// project, or be an admin.
///
/// Invoked explicitly by handlers before the core operation runs.
pub async fn require_project_role(
    pool: &DbPool,
    user: &AuthUser,
    project_id: DbId,
    roles: &[&str],
) -> Result<(), AppError> {
    if user.is_admin {
        return Ok(());
    }
    let role = UserRepo::project_role(pool, user.user_id, project_id)
        .await?
        .unwrap_or_default();
    if roles.contains(&role.as_str()) {
        return Ok(());
    }
    Err(AppError::Core(CoreError::Forbidden(format!(
        "Role {} required on this project",
        roles.join(" or ")
    ))))
}
