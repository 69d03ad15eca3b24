//! Login endpoint issuing session tokens.

use axum::extract::State;
use axum::Json;
use packforge_core::error::CoreError;
use packforge_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub is_admin: bool,
}

/// POST /api/login
///
/// The built-in `admin` account authenticates against the configured
/// admin password and never reaches the auth backend; every other user
/// goes through the backend plugin.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let username = input.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::Core(CoreError::Unauthorized("Login failed".into())));
    }

    if username == "admin" {
        let Some(admin_pass) = state.config.admin_password.as_deref() else {
            tracing::info!("Admin password is not set in configuration");
            return Err(AppError::Core(CoreError::Unauthorized("Login failed".into())));
        };
        if input.password != admin_pass {
            return Err(AppError::Core(CoreError::Unauthorized("Login failed".into())));
        }
        let claims = jwt::claims_for(&state.config.jwt, 0, "admin", true);
        let token = jwt::create_token(&state.config.jwt, &claims)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        return Ok(Json(LoginResponse { token, username, is_admin: true }));
    }

    let authenticated = state
        .auth_backend
        .login(&username, &input.password)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    if !authenticated {
        return Err(AppError::Core(CoreError::Unauthorized("Login failed".into())));
    }

    let user = UserRepo::find_by_username(&state.pool, &username)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Login failed".into())))?;

    let claims = jwt::claims_for(&state.config.jwt, user.id, &user.username, user.is_admin);
    let token = jwt::create_token(&state.config.jwt, &claims)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(Json(LoginResponse {
        token,
        username: user.username,
        is_admin: user.is_admin,
    }))
}
