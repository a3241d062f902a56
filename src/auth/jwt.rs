//! Token codec for session credentials
//!
//! Issues and verifies the two credential kinds handed out at login:
//! - access tokens carry the account id and a role snapshot, default expiry 1 day
//! - refresh tokens carry only the account id, default expiry 7 days
//!
//! Tokens are HS256 JWTs. The `kind` claim keeps the two apart: a refresh
//! token is rejected wherever an access token is expected and vice versa.
//!
//! Expiry is checked here rather than by `jsonwebtoken`, because a token whose
//! `exp` equals the current second must already count as expired.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthError, Role};
use crate::types::BailiffError;

/// Scheme expected in the Authorization header (compared case-insensitively)
pub const BEARER_SCHEME: &str = "Bearer";

const MIN_SECRET_LEN: usize = 32;

/// Longest token lifetime accepted from configuration (10 years)
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;
const DEV_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Which credential a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload stored in a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    /// Role at issue time. Advisory only; the resolver reads the live role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub kind: TokenKind,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration time (Unix seconds)
    pub exp: i64,
}

/// A freshly signed token and the moment it stops being accepted
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Signs and verifies credentials with a server-held secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenCodec {
    /// Create a codec
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(
        secret: &str,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
    ) -> Result<Self, BailiffError> {
        if secret.is_empty() {
            return Err(BailiffError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(BailiffError::Config(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        for (name, ttl) in [
            ("JWT_EXPIRY_SECONDS", access_ttl_seconds),
            ("REFRESH_EXPIRY_SECONDS", refresh_ttl_seconds),
        ] {
            if ttl == 0 || ttl > MAX_TTL_SECONDS {
                return Err(BailiffError::Config(format!(
                    "{name} must be between 1 and {MAX_TTL_SECONDS}"
                )));
            }
        }

        Ok(Self::from_secret(
            secret,
            access_ttl_seconds as i64,
            refresh_ttl_seconds as i64,
        ))
    }

    /// Create a codec for dev mode (fixed, publicly known secret)
    pub fn new_dev() -> Self {
        Self::from_secret(DEV_SECRET, 24 * 60 * 60, 7 * 24 * 60 * 60)
    }

    fn from_secret(secret: &str, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// Issue an access token for an account
    pub fn issue_access(
        &self,
        principal_id: &str,
        role: Role,
    ) -> Result<IssuedToken, BailiffError> {
        self.issue_access_at(principal_id, role, Utc::now().timestamp())
    }

    pub fn issue_access_at(
        &self,
        principal_id: &str,
        role: Role,
        now: i64,
    ) -> Result<IssuedToken, BailiffError> {
        self.sign(Claims {
            sub: principal_id.to_string(),
            role: Some(role),
            kind: TokenKind::Access,
            iat: now,
            exp: expiry(now, self.access_ttl_seconds)?,
        })
    }

    /// Issue a refresh token for an account
    pub fn issue_refresh(&self, principal_id: &str) -> Result<IssuedToken, BailiffError> {
        self.issue_refresh_at(principal_id, Utc::now().timestamp())
    }

    pub fn issue_refresh_at(
        &self,
        principal_id: &str,
        now: i64,
    ) -> Result<IssuedToken, BailiffError> {
        self.sign(Claims {
            sub: principal_id.to_string(),
            role: None,
            kind: TokenKind::Refresh,
            iat: now,
            exp: expiry(now, self.refresh_ttl_seconds)?,
        })
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, BailiffError> {
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BailiffError::Internal(format!("Failed to sign token: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Decode the raw Authorization header value into access-token claims
    pub fn decode(&self, auth_header: Option<&str>) -> Result<Claims, AuthError> {
        self.decode_at(auth_header, Utc::now().timestamp())
    }

    pub fn decode_at(&self, auth_header: Option<&str>, now: i64) -> Result<Claims, AuthError> {
        let token = extract_bearer_token(auth_header)?;
        self.decode_access_at(token, now)
    }

    /// Verify a bare access token
    pub fn decode_access_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Access, now)
    }

    /// Verify a bare refresh token
    pub fn decode_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode_refresh_at(token, Utc::now().timestamp())
    }

    pub fn decode_refresh_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        self.verify(token, TokenKind::Refresh, now)
    }

    fn verify(&self, token: &str, expected: TokenKind, now: i64) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                debug!(kind = ?err.kind(), "Token verification failed");
                AuthError::Invalid
            })?
            .claims;

        if claims.kind != expected {
            debug!(got = ?claims.kind, ?expected, "Token kind mismatch");
            return Err(AuthError::Invalid);
        }

        if now >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}

fn expiry(now: i64, ttl_seconds: i64) -> Result<i64, BailiffError> {
    now.checked_add(ttl_seconds)
        .ok_or_else(|| BailiffError::Internal("Token expiry out of range".into()))
}

/// Extract the token from an Authorization header of the form `Bearer <token>`.
///
/// The header must split on a single space into exactly two non-empty parts and
/// the scheme must equal `Bearer` ignoring case.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.ok_or(AuthError::MalformedHeader)?;

    let mut parts = header.split(' ');
    let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => (scheme, token),
        _ => return Err(AuthError::MalformedHeader),
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}
