use chrono::{DateTime, Utc};
use rocket::FromForm;
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::auth::service::IssuedTokens;
use crate::models::UserView;

/// Multipart registration form. Every field is optional at the parsing
/// layer so missing input surfaces as a 400 from the service, not a 422.
#[derive(Debug, FromForm)]
pub struct RegisterForm<'r> {
    #[field(name = "fullName")]
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<TempFile<'r>>,
    #[field(name = "coverImage")]
    pub cover_image: Option<TempFile<'r>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl From<&IssuedTokens> for TokenPairResponse {
    fn from(tokens: &IssuedTokens) -> Self {
        Self {
            access_token: tokens.access.token.clone(),
            refresh_token: tokens.refresh.token.clone(),
            access_token_expires_at: tokens.access.expires_at,
            refresh_token_expires_at: tokens.refresh.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenPairResponse,
}
