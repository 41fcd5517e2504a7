use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, User};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token format")]
    Malformed,

    #[error("Token subject is not a valid user id")]
    InvalidSubject,
}

/// Validates an HS256 bearer token and resolves the clinic user it names.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    // Supabase issues `aud: authenticated`; audience is not part of our trust model.
    validation.validate_aud = false;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    })?;

    let claims = data.claims;
    let id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSubject)?;

    let user = User {
        id,
        email: claims.email.clone(),
        role: claims.clinic_role(),
    };

    debug!("Token validated successfully for user: {} ({})", user.id, user.role);
    Ok(user)
}
