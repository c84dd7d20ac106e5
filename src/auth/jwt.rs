//! JWT token issuance and verification
//!
//! Tokens are HS256 JWTs carrying subject id, role, issued-at, expiry and a
//! unique token id. Rotating the secret invalidates every outstanding token.

use crate::{config::SecurityConfig, error::AppError, models::user::Role};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Role at issuance time
    pub role: Role,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

/// Claims extracted from a token that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject_id: i64,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Why a token failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("signature mismatch")]
    BadSignature,

    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,

    #[error("token expired")]
    Expired,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// Create JWT service from a shared secret
    pub fn new(secret: &[u8]) -> Result<Self, AppError> {
        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::new(config.jwt_secret.expose_secret().as_bytes())
    }

    /// Issue a token for `subject_id` valid for `ttl`
    pub fn issue(&self, subject_id: i64, role: Role, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("Token lifetime out of range: {}", e)))?;
        let expiration = now + ttl;

        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Verify signature, algorithm and expiry
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        TokenError::UnsupportedAlgorithm
                    }
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                };
                tracing::debug!(?reason, "Token validation failed: {:?}", e);
                reason
            })?
            .claims;

        let subject_id = claims.sub.parse::<i64>().map_err(|_| {
            tracing::debug!("Token subject is not a numeric id");
            TokenError::Malformed
        })?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(VerifiedToken {
            subject_id,
            role: claims.role,
            expires_at,
        })
    }
}
