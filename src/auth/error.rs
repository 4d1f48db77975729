use rocket::http::Status;
use thiserror::Error;

use crate::auth::jwt::{TokenKind, VerificationFailure};
use crate::media::MediaError;
use crate::store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{kind} token expired")]
    TokenExpired { kind: TokenKind },
    #[error("invalid {kind} token")]
    TokenInvalid { kind: TokenKind },
    #[error("refresh token expired or reused")]
    TokenReused,
    #[error("unauthorized request")]
    Unauthorized,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
}

impl AuthError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AuthError::BadRequest(message.into())
    }

    pub fn from_verification(kind: TokenKind, failure: VerificationFailure) -> Self {
        match failure {
            VerificationFailure::Expired => AuthError::TokenExpired { kind },
            VerificationFailure::Malformed | VerificationFailure::SignatureInvalid => {
                AuthError::TokenInvalid { kind }
            }
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::BadRequest(_) => Status::BadRequest,
            AuthError::Conflict(_) => Status::Conflict,
            AuthError::NotFound(_) => Status::NotFound,
            AuthError::InvalidCredentials
            | AuthError::TokenExpired { .. }
            | AuthError::TokenInvalid { .. }
            | AuthError::TokenReused
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Config(_)
            | AuthError::Store(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Media(_) => Status::InternalServerError,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }

    /// Message safe to show a caller: internal details are replaced.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => {
                AuthError::Conflict(format!("user with this {field} already exists"))
            }
            other => AuthError::Store(other),
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_details() {
        let err = AuthError::Config("ACCESS_TOKEN_SECRET is required".into());
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.public_message(), "internal server error");

        let err = AuthError::bad_request("Email and password are required");
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(err.public_message(), "Email and password are required");
    }

    #[test]
    fn duplicate_store_writes_become_conflicts() {
        let err = AuthError::from(StoreError::Duplicate("email"));
        assert_eq!(err.status(), Status::Conflict);
    }

    #[test]
    fn verification_failures_keep_expiry_distinct() {
        let expired = AuthError::from_verification(TokenKind::Refresh, VerificationFailure::Expired);
        assert_eq!(expired.to_string(), "refresh token expired");
        let forged =
            AuthError::from_verification(TokenKind::Access, VerificationFailure::SignatureInvalid);
        assert_eq!(forged.to_string(), "invalid access token");
        assert_eq!(expired.status(), Status::Unauthorized);
        assert_eq!(forged.status(), Status::Unauthorized);
    }
}
