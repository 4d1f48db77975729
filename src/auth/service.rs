//! Account lifecycle: registration, login, token refresh, logout and
//! password change.
//!
//! Every operation validates its input before touching storage, so a
//! rejected request never leaves a partial write behind.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{SignedToken, TokenKind};
use crate::auth::validation::{self, all_present, normalize};
use crate::auth::{AuthConfig, AuthError, AuthResult, JwtService, PasswordService, RefreshTokenStore};
use crate::models::{NewUser, UserView};
use crate::store::UserStore;

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: IssuedTokens,
    pub user: UserView,
}

pub struct AuthService {
    config: AuthConfig,
    passwords: PasswordService,
    tokens: JwtService,
    sessions: RefreshTokenStore,
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        passwords: PasswordService,
        tokens: JwtService,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            config,
            passwords,
            tokens,
            sessions: RefreshTokenStore::new(users.clone()),
            users,
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: AuthConfig, users: Arc<dyn UserStore>) -> AuthResult<Self> {
        let passwords = PasswordService::new()?;
        let tokens = JwtService::from_config(&config)?;
        Ok(Self::new(config, passwords, tokens, users))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn tokens(&self) -> &JwtService {
        &self.tokens
    }

    pub fn sessions(&self) -> &RefreshTokenStore {
        &self.sessions
    }

    pub async fn register(&self, input: Registration) -> AuthResult<UserView> {
        if !all_present(&[
            input.full_name.as_str(),
            input.username.as_str(),
            input.email.as_str(),
            input.password.as_str(),
        ]) {
            return Err(AuthError::bad_request("All fields are required"));
        }
        let email = validation::require_email(&input.email)?;
        validation::require_password_length(&input.password, self.config.password_min_length)?;
        let username = normalize(&input.username);

        if self
            .users
            .find_by_username_or_email(&username, &email)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "User with this email or username already exists".into(),
            ));
        }

        let avatar = match input.avatar.filter(|avatar| !avatar.trim().is_empty()) {
            Some(avatar) => avatar,
            None => return Err(AuthError::bad_request("Avatar file is required")),
        };

        let password_hash = self.passwords.hash_password(&input.password)?;

        let user = self
            .users
            .insert_user(NewUser {
                username,
                email,
                full_name: input.full_name.trim().to_string(),
                avatar,
                cover_image: input.cover_image.filter(|cover| !cover.trim().is_empty()),
                password_hash,
            })
            .await?;

        log::info!("registered user {}", user.id);
        Ok(user.view())
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        if !all_present(&[email, password]) {
            return Err(AuthError::bad_request("Email and password are required"));
        }
        let email = validation::require_email(email)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User does not exist".into()))?;

        if !self.passwords.verify_password(password, &user.password_hash)? {
            log::debug!("password mismatch for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if self.passwords.needs_rehash(&user.password_hash) {
            self.upgrade_password_hash(user.id, password).await;
        }

        let tokens = self.issue_pair(user.id)?;
        if !self
            .sessions
            .set_refresh_token(user.id, &tokens.refresh.token)
            .await?
        {
            return Err(AuthError::NotFound("User does not exist".into()));
        }

        log::info!("user {} logged in", user.id);
        Ok(LoginOutcome {
            tokens,
            user: user.view(),
        })
    }

    pub async fn refresh(&self, incoming: Option<&str>) -> AuthResult<IssuedTokens> {
        let incoming = match incoming.filter(|token| !token.trim().is_empty()) {
            Some(token) => token,
            None => return Err(AuthError::Unauthorized),
        };

        let subject = self
            .tokens
            .verify(incoming, TokenKind::Refresh)
            .map_err(|failure| AuthError::from_verification(TokenKind::Refresh, failure))?;

        if self.users.find_by_id(subject.subject_id).await?.is_none() {
            return Err(AuthError::TokenInvalid {
                kind: TokenKind::Refresh,
            });
        }

        if !self.sessions.matches(subject.subject_id, incoming).await? {
            log::warn!(
                "rejected stale or reused refresh token for user {}",
                subject.subject_id
            );
            return Err(AuthError::TokenReused);
        }

        let tokens = self.issue_pair(subject.subject_id)?;
        self.sessions
            .set_refresh_token(subject.subject_id, &tokens.refresh.token)
            .await?;

        log::debug!("rotated refresh token for user {}", subject.subject_id);
        Ok(tokens)
    }

    pub async fn logout(&self, subject_id: Uuid) -> AuthResult<()> {
        if !self.sessions.clear_refresh_token(subject_id).await? {
            return Err(AuthError::NotFound("User does not exist".into()));
        }
        log::info!("user {} logged out", subject_id);
        Ok(())
    }

    pub async fn change_password(
        &self,
        subject_id: Uuid,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> AuthResult<()> {
        let (old_password, new_password) = match (old_password, new_password) {
            (Some(old), Some(new)) if all_present(&[old, new]) => (old, new),
            _ => {
                return Err(AuthError::bad_request(
                    "Old password and new password are required",
                ));
            }
        };

        let user = self
            .users
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User does not exist".into()))?;

        if !self
            .passwords
            .verify_password(old_password, &user.password_hash)?
        {
            return Err(AuthError::bad_request("Old password is incorrect"));
        }
        validation::require_password_length(new_password, self.config.password_min_length)?;

        let password_hash = self.passwords.hash_password(new_password)?;
        if !self
            .users
            .update_password_hash(subject_id, &password_hash)
            .await?
        {
            return Err(AuthError::NotFound("User does not exist".into()));
        }

        if self.config.revoke_sessions_on_password_change {
            self.sessions.clear_refresh_token(subject_id).await?;
        }

        log::info!("user {} changed password", subject_id);
        Ok(())
    }

    /// Resolve an access token to the sanitized identity it names.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<UserView> {
        let subject = self
            .tokens
            .verify(access_token, TokenKind::Access)
            .map_err(|failure| AuthError::from_verification(TokenKind::Access, failure))?;

        let user = self
            .users
            .find_by_id(subject.subject_id)
            .await?
            .ok_or(AuthError::TokenInvalid {
                kind: TokenKind::Access,
            })?;

        Ok(user.view())
    }

    /// Re-hash with the current cost after a successful login. A failure
    /// keeps the old hash, which still verifies.
    async fn upgrade_password_hash(&self, subject_id: Uuid, password: &str) {
        let upgraded = match self.passwords.hash_password(password) {
            Ok(hash) => self.users.update_password_hash(subject_id, &hash).await,
            Err(err) => {
                log::warn!("could not re-hash password for user {}: {}", subject_id, err);
                return;
            }
        };
        match upgraded {
            Ok(_) => log::debug!("upgraded password hash for user {}", subject_id),
            Err(err) => log::warn!(
                "could not store re-hashed password for user {}: {}",
                subject_id,
                err
            ),
        }
    }

    /// Both tokens are minted before anything is persisted.
    fn issue_pair(&self, subject_id: Uuid) -> AuthResult<IssuedTokens> {
        let access = self.tokens.issue_access_token(subject_id)?;
        let refresh = self.tokens.issue_refresh_token(subject_id)?;
        Ok(IssuedTokens { access, refresh })
    }
}
