//! JWT token maker.
//!
//! HS256-signed tokens carrying a uuid token id, issuer, username, role
//! and expiry. The same maker issues both access and refresh tokens; they
//! differ only in lifetime.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Role, TOKEN_ISSUER, TokenError, TokenMaker, TokenPayload};

/// Symmetric keys shorter than this are rejected at construction.
pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// HS256 JWT maker backed by a symmetric key.
pub struct JwtMaker {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtMaker").finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: Uuid,
    iss: String,
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
}

impl JwtMaker {
    pub fn new(secret_key: &SecretString) -> Result<Self, TokenError> {
        let secret = secret_key.expose_secret();
        if secret.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKey(format!(
                "key must be at least {MIN_SECRET_KEY_SIZE} characters"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

impl TokenMaker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        role: Role,
        duration: Duration,
    ) -> Result<(String, TokenPayload), TokenError> {
        let payload = TokenPayload::new(username.to_string(), role, duration);
        let claims = Claims {
            jti: payload.id,
            iss: payload.issuer.clone(),
            sub: payload.username.clone(),
            role: payload.role,
            iat: payload.issued_at.timestamp(),
            exp: payload.expired_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        let claims = data.claims;
        let issued_at = timestamp_to_datetime(claims.iat)?;
        let expired_at = timestamp_to_datetime(claims.exp)?;

        Ok(TokenPayload {
            id: claims.jti,
            issuer: claims.iss,
            username: claims.sub,
            role: claims.role,
            issued_at,
            expired_at,
        })
    }
}

fn timestamp_to_datetime(ts: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or(TokenError::Invalid)
}
