//! JWT service for token generation and validation
//!
//! Tokens are HMAC-signed with a process-wide secret. Access tokens live for
//! minutes, refresh tokens for days; both carry their expiry and kind in the
//! claims and are rejected once the expiry has passed. Changing the secret
//! invalidates every token issued under the previous one.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub use jsonwebtoken::Algorithm;

/// Errors produced while issuing or verifying tokens
#[derive(Error, Debug)]
pub enum TokenError {
    /// Bad signature, malformed token, wrong kind, or expired
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token subject must not be empty")]
    EmptySubject,

    #[error("Token lifetime is out of range")]
    LifetimeOutOfRange,

    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// JWT configuration, built once at startup
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: String,
    /// Signing algorithm, one of HS256, HS384 or HS512
    pub algorithm: Algorithm,
    /// Access token lifetime in minutes
    pub access_token_expiry_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_token_expiry_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_token_expiry_minutes", &self.access_token_expiry_minutes)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: signing secret (required)
    /// - `JWT_ALGORITHM`: HS256, HS384 or HS512 (default: HS256)
    /// - `JWT_ACCESS_TOKEN_EXPIRY_MINUTES`: access token lifetime (default: 30)
    /// - `JWT_REFRESH_TOKEN_EXPIRY_DAYS`: refresh token lifetime (default: 7)
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("algorithm", "HS256")?
            .set_default("access_token_expiry_minutes", 30i64)?
            .set_default("refresh_token_expiry_days", 7i64)?
            .add_source(config::Environment::with_prefix("JWT"))
            .build()
            .context("Failed to read JWT configuration")?;

        let config: JwtConfig = settings
            .try_deserialize()
            .context("Invalid JWT configuration (is JWT_SECRET set?)")?;

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration directly, with the same checks as `from_env`
    pub fn new(
        secret: impl Into<String>,
        algorithm: Algorithm,
        access_token_expiry_minutes: i64,
        refresh_token_expiry_days: i64,
    ) -> Result<Self> {
        let config = JwtConfig {
            secret: secret.into(),
            algorithm,
            access_token_expiry_minutes,
            refresh_token_expiry_days,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            anyhow::bail!(
                "Unsupported JWT algorithm {:?}; expected HS256, HS384 or HS512",
                self.algorithm
            );
        }

        if self.access_token_expiry_minutes <= 0 || self.refresh_token_expiry_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        Ok(())
    }
}

/// Token kind
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, presented on every request
    Access,
    /// Long-lived, exchanged for new access tokens
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User email
    pub sub: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Token kind (access or refresh)
    pub token_type: TokenKind,
}

/// JWT service
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Initialize a new JWT service
    pub fn new(config: &JwtConfig) -> Result<Self, TokenError> {
        let access_ttl = Duration::try_minutes(config.access_token_expiry_minutes)
            .ok_or(TokenError::LifetimeOutOfRange)?;
        let refresh_ttl = Duration::try_days(config.refresh_token_expiry_days)
            .ok_or(TokenError::LifetimeOutOfRange)?;

        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(TokenService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            header: Header::new(config.algorithm),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    /// Issue a token of the given kind for `subject`
    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(subject, kind, Utc::now())
    }

    /// Issue a token as if it had been created at `issued_at`
    pub fn issue_at(
        &self,
        subject: &str,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let expires_at = issued_at
            .checked_add_signed(self.ttl(kind))
            .ok_or(TokenError::LifetimeOutOfRange)?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type: kind,
        };

        encode(&self.header, &claims, &self.encoding_key).map_err(TokenError::Encoding)
    }

    /// Validate a token's signature and expiry and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                TokenError::InvalidToken
            })?;
        Ok(token_data.claims)
    }

    /// Validate a token, require it to be of `kind`, and return its subject
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != kind {
            debug!(
                "Token rejected: expected {:?} token, got {:?}",
                kind, claims.token_type
            );
            return Err(TokenError::InvalidToken);
        }
        Ok(claims.sub)
    }

    /// Lifetime of a token kind
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Access token lifetime in seconds, as reported to clients
    pub fn access_token_expiry(&self) -> i64 {
        self.access_ttl.num_seconds()
    }
}
