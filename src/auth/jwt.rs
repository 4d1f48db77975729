use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token, so two tokens minted in the same second differ.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Decoded identity of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub subject_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(kind: TokenKind, secret: &str, ttl_secs: i64) -> AuthResult<Self> {
        let ttl = Duration::try_seconds(ttl_secs)
            .ok_or_else(|| AuthError::Config(format!("{kind} token expiry out of range")))?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }
}

/// HS256 token issuer. Access and refresh tokens use independent secrets,
/// so a token of one kind never verifies as the other.
pub struct JwtService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.token_leeway_secs;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            access: SigningKeys::new(
                TokenKind::Access,
                &config.access_token_secret,
                config.access_token_ttl_secs,
            )?,
            refresh: SigningKeys::new(
                TokenKind::Refresh,
                &config.refresh_token_secret,
                config.refresh_token_ttl_secs,
            )?,
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue_access_token(&self, subject_id: Uuid) -> AuthResult<SignedToken> {
        self.issue_at(TokenKind::Access, subject_id, Utc::now())
    }

    pub fn issue_refresh_token(&self, subject_id: Uuid) -> AuthResult<SignedToken> {
        self.issue_at(TokenKind::Refresh, subject_id, Utc::now())
    }

    /// Mint a token as if issued at `issued_at`; expiry follows the kind's TTL.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject_id: Uuid,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<SignedToken> {
        let keys = self.keys(kind);
        let expires_at = issued_at
            .checked_add_signed(keys.ttl)
            .ok_or_else(|| AuthError::Config(format!("{kind} token expiry overflows the clock")))?;

        let claims = TokenClaims {
            sub: subject_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;

        Ok(SignedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenSubject, VerificationFailure> {
        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => VerificationFailure::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    VerificationFailure::SignatureInvalid
                }
                _ => VerificationFailure::Malformed,
            })?;

        let claims = data.claims;
        let subject_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| VerificationFailure::Malformed)?;
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or(VerificationFailure::Malformed)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(VerificationFailure::Malformed)?;

        Ok(TokenSubject {
            subject_id,
            issued_at,
            expires_at,
        })
    }
}
