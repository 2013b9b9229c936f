//! JWT token service
//!
//! Staff tokens are issued by the external identity provider (HS256, shared
//! secret). This service validates them; `generate_token` exists for
//! development and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum secret length accepted outside development
pub const MIN_SECRET_LEN: usize = 32;

/// Roles allowed to operate the loyalty program
pub const STAFF_ROLES: &[&str] = &["staff", "admin"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Shared HS256 secret (at least 32 bytes)
    pub secret: String,
    /// Lifetime of tokens minted by [`JwtService::generate_token`]
    pub expiration_minutes: i64,
    pub issuer: String,
    pub audience: String,
}

impl JwtConfig {
    /// Load from `JWT_SECRET`, `JWT_ISSUER`, `JWT_AUDIENCE`
    ///
    /// Development falls back to a random secret when `JWT_SECRET` is unset;
    /// every other environment requires it.
    pub fn from_env(is_development: bool) -> Result<Self, JwtError> {
        let secret = load_jwt_secret(std::env::var("JWT_SECRET").ok(), is_development)?;
        Ok(Self {
            secret,
            expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(720),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "identity-provider".to_string()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "loyalty-admin".to_string()),
        })
    }

    /// Fixed configuration for tests
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_minutes: 60,
            issuer: "identity-provider".to_string(),
            audience: "loyalty-admin".to_string(),
        }
    }
}

/// Claims carried by a staff token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Staff user ID
    pub sub: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Printable random secret for development
pub fn generate_secure_printable_jwt_secret() -> Result<String, JwtError> {
    const ALLOWED: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 64];
    rng.fill(&mut bytes)
        .map_err(|_| JwtError::ConfigError("Failed to generate secure random key".to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| ALLOWED[*b as usize % ALLOWED.len()] as char)
        .collect())
}

fn load_jwt_secret(value: Option<String>, is_development: bool) -> Result<String, JwtError> {
    match value {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => Ok(secret),
        Some(_) => Err(JwtError::ConfigError(format!(
            "JWT_SECRET must be at least {MIN_SECRET_LEN} characters long"
        ))),
        None if is_development => {
            tracing::warn!("JWT_SECRET not set, generating a temporary key for development");
            generate_secure_printable_jwt_secret()
        }
        None => Err(JwtError::ConfigError(
            "JWT_SECRET environment variable must be set outside development".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Mint a staff token (development and tests)
    pub fn generate_token(&self, user_id: &str, name: &str, role: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// Validate signature, expiry, issuer and audience
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Token from an `Authorization: Bearer <token>` header
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

/// Authenticated staff member, injected by [`crate::auth::require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
        }
    }
}

impl CurrentUser {
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.contains(&self.role.as_str())
    }
}
