use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use sha2::{Digest, Sha512};
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::store::UserStore;

/// The single active refresh token per account, kept as a digest on the
/// user record. Writes are last-write-wins with no locking: a later login
/// supplants an earlier one.
#[derive(Clone)]
pub struct RefreshTokenStore {
    users: Arc<dyn UserStore>,
}

impl RefreshTokenStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Returns `false` when the account does not exist.
    pub async fn set_refresh_token(&self, subject_id: Uuid, token: &str) -> AuthResult<bool> {
        let digest = digest_token(token);
        Ok(self
            .users
            .set_refresh_token_hash(subject_id, Some(&digest))
            .await?)
    }

    pub async fn clear_refresh_token(&self, subject_id: Uuid) -> AuthResult<bool> {
        Ok(self.users.set_refresh_token_hash(subject_id, None).await?)
    }

    /// The stored digest, or `None` when no session is active.
    pub async fn get_refresh_token(&self, subject_id: Uuid) -> AuthResult<Option<String>> {
        Ok(self.users.refresh_token_hash(subject_id).await?)
    }

    /// Whether `token` is the account's current refresh token.
    pub async fn matches(&self, subject_id: Uuid, token: &str) -> AuthResult<bool> {
        let stored = match self.get_refresh_token(subject_id).await? {
            Some(stored) => stored,
            None => return Ok(false),
        };
        let candidate = digest_token(token);
        Ok(constant_time_eq::constant_time_eq(
            candidate.as_bytes(),
            stored.as_bytes(),
        ))
    }
}

fn digest_token(token: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(token.as_bytes());
    STANDARD_NO_PAD.encode(hasher.finalize())
}

mod constant_time_eq {
    /// Constant-time comparison to avoid timing side-channels.
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }

        let mut result: u8 = 0;
        for (&x, &y) in a.iter().zip(b.iter()) {
            result |= x ^ y;
        }

        result == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::MemoryUserStore;

    async fn store_with_user() -> (RefreshTokenStore, Uuid) {
        let users = Arc::new(MemoryUserStore::new());
        let user = users
            .insert_user(NewUser {
                username: "ada".into(),
                email: "ada@x.com".into(),
                full_name: "Ada Lovelace".into(),
                avatar: "/media/ada.png".into(),
                cover_image: None,
                password_hash: "hash".into(),
            })
            .await
            .expect("insert");
        (RefreshTokenStore::new(users), user.id)
    }

    #[tokio::test]
    async fn stores_digest_not_token() {
        let (store, user_id) = store_with_user().await;
        assert!(store.set_refresh_token(user_id, "token-one").await.expect("set"));

        let stored = store
            .get_refresh_token(user_id)
            .await
            .expect("get")
            .expect("present");
        assert_ne!(stored, "token-one");
        assert!(store.matches(user_id, "token-one").await.expect("match"));
        assert!(!store.matches(user_id, "token-two").await.expect("match"));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let (store, user_id) = store_with_user().await;
        store.set_refresh_token(user_id, "first").await.expect("set");
        store.set_refresh_token(user_id, "second").await.expect("set");

        assert!(!store.matches(user_id, "first").await.expect("match"));
        assert!(store.matches(user_id, "second").await.expect("match"));
    }

    #[tokio::test]
    async fn clearing_ends_the_session() {
        let (store, user_id) = store_with_user().await;
        store.set_refresh_token(user_id, "token").await.expect("set");
        assert!(store.clear_refresh_token(user_id).await.expect("clear"));

        assert_eq!(store.get_refresh_token(user_id).await.expect("get"), None);
        assert!(!store.matches(user_id, "token").await.expect("match"));
    }

    #[tokio::test]
    async fn unknown_subject_reports_missing() {
        let (store, _) = store_with_user().await;
        assert!(!store.set_refresh_token(Uuid::new_v4(), "token").await.expect("set"));
    }

    #[test]
    fn constant_time_eq_compares_lengths_and_bytes() {
        assert!(constant_time_eq::constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq::constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq::constant_time_eq(b"abc", b"abcd"));
    }
}
