// JWT validation dengan database untuk Payment Service

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use shared::models::claims::TokenClaims;
use sqlx::PgPool;
use std::env;
use thiserror::Error;

// Error types untuk JWT validation
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token invalid atau expired")]
    InvalidToken,
    #[error("JWT secret tidak ditemukan")]
    MissingSecret,
    #[error("Token type tidak valid untuk endpoint ini")]
    InvalidTokenType,
    #[error("Token sudah di-blacklist")]
    TokenBlacklisted,
    #[error("Database error saat validasi blacklist")]
    DatabaseError,
}

// Decode JWT token dan validasi signature
fn decode_jwt_token(token: &str) -> Result<TokenClaims, JwtError> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| JwtError::MissingSecret)?;

    // Production safety check
    if !cfg!(debug_assertions) && secret.contains("change-this") {
        return Err(JwtError::MissingSecret);
    }

    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| JwtError::InvalidToken)?;

    // Business services hanya terima access token
    if !token_data.claims.is_access_token() {
        return Err(JwtError::InvalidTokenType);
    }

    Ok(token_data.claims)
}

// Cek apakah token sudah di-blacklist (logout / revoked)
async fn check_jwt_blacklist(pool: &PgPool, claims: &TokenClaims) -> Result<(), JwtError> {
    let is_blacklisted = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM jwt_blacklist WHERE jti = $1)",
    )
    .bind(&claims.jti)
    .fetch_one(pool)
    .await
    .map_err(|_| JwtError::DatabaseError)?;

    if is_blacklisted {
        return Err(JwtError::TokenBlacklisted);
    }

    Ok(())
}

// Main validation function dengan database trust boundary
pub async fn validate_token(token: &str, pool: &PgPool) -> Result<TokenClaims, JwtError> {
    let claims = decode_jwt_token(token)?;
    check_jwt_blacklist(pool, &claims).await?;
    Ok(claims)
}
