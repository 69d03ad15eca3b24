//! JWT session token creation and verification.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use packforge_core::types::DbId;
use serde::{Deserialize, Serialize};

/// JWT configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC signing secret (`JWT_SECRET`).
    pub secret: String,
    /// Token lifetime in seconds (`JWT_EXPIRY_SECS`, default 86400).
    pub expiry_secs: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "insecure-dev-secret-change-me".into());
        let expiry_secs: i64 = std::env::var("JWT_EXPIRY_SECS")
            .unwrap_or_else(|_| "86400".into())
            .parse()
            .expect("JWT_EXPIRY_SECS must be a valid i64");
        Self { secret, expiry_secs }
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, or 0 for the built-in admin account.
    pub sub: DbId,
    pub username: String,
    pub is_admin: bool,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Issue a token for a user.
pub fn create_token(config: &JwtConfig, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify a token and return its claims.
pub fn verify_token(config: &JwtConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Claims for `username` expiring `expiry_secs` from now.
pub fn claims_for(config: &JwtConfig, user_id: DbId, username: &str, is_admin: bool) -> Claims {
    Claims {
        sub: user_id,
        username: username.to_string(),
        is_admin,
        exp: chrono::Utc::now().timestamp() + config.expiry_secs,
    }
}
