//! Account persistence.
//!
//! [`UserStore`] is the seam between the auth/profile logic and storage.
//! [`PgUserStore`] backs production; [`MemoryUserStore`] backs tests and
//! `ACCOUNT_STORE=memory` local runs.

use rocket_db_pools::sqlx;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ChannelProfile, NewUser, ProfileUpdate, UserRecord, WatchedVideo};

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; carries the field name.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// First account whose username OR email matches.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<UserRecord>>;

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// Returns `false` when the account does not exist.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> StoreResult<Option<UserRecord>>;

    /// Overwrite (or clear, with `None`) the stored refresh-token digest.
    /// Returns `false` when the account does not exist.
    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> StoreResult<bool>;

    async fn refresh_token_hash(&self, id: Uuid) -> StoreResult<Option<String>>;

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>>;

    /// Videos the user watched, most recent first.
    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>>;
}
