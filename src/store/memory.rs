use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{
    ChannelProfile, NewUser, ProfileUpdate, UserRecord, VideoOwner, WatchedVideo,
};
use crate::store::{StoreError, StoreResult, UserStore};

#[derive(Debug, Clone)]
struct VideoEntry {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    thumbnail: String,
    duration_secs: i32,
    views: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    /// (subscriber, channel)
    subscriptions: HashSet<(Uuid, Uuid)>,
    videos: HashMap<Uuid, VideoEntry>,
    /// user -> (video, watched_at)
    history: HashMap<Uuid, Vec<(Uuid, DateTime<Utc>)>>,
}

/// Process-local store. Uniqueness of username and email is enforced under
/// the write lock, mirroring the Postgres constraints.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Uuid, channel: Uuid) {
        self.inner.write().subscriptions.insert((subscriber, channel));
    }

    pub fn add_video(&self, owner_id: Uuid, title: &str, duration_secs: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().videos.insert(
            id,
            VideoEntry {
                id,
                owner_id,
                title: title.to_string(),
                description: String::new(),
                thumbnail: String::new(),
                duration_secs,
                views: 0,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Record a view; watching the same video again moves it to the front.
    pub fn record_watch(&self, user_id: Uuid, video_id: Uuid, watched_at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        if let Some(video) = inner.videos.get_mut(&video_id) {
            video.views += 1;
        }
        let entries = inner.history.entry(user_id).or_default();
        entries.retain(|(id, _)| *id != video_id);
        entries.push((video_id, watched_at));
    }

    pub fn delete_user(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write();
        inner
            .subscriptions
            .retain(|(subscriber, channel)| *subscriber != id && *channel != id);
        inner.history.remove(&id);
        inner.users.remove(&id).is_some()
    }
}

impl Inner {
    fn find(&self, predicate: impl Fn(&UserRecord) -> bool) -> Option<UserRecord> {
        self.users.values().find(|user| predicate(user)).cloned()
    }

    fn check_unique(
        &self,
        id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<()> {
        for user in self.users.values() {
            if Some(user.id) == id {
                continue;
            }
            if email == Some(user.email.as_str()) {
                return Err(StoreError::Duplicate("email"));
            }
            if username == Some(user.username.as_str()) {
                return Err(StoreError::Duplicate("username"));
            }
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.read().find(|user| user.email == email))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .inner
            .read()
            .find(|user| user.username == username || user.email == email))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut inner = self.inner.write();
        inner.check_unique(None, Some(&user.username), Some(&user.email))?;

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image.unwrap_or_default(),
            password_hash: user.password_hash,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> StoreResult<Option<UserRecord>> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&id) {
            return Ok(None);
        }
        match &update {
            ProfileUpdate::Email(email) => inner.check_unique(Some(id), None, Some(email))?,
            ProfileUpdate::Username(username) => {
                inner.check_unique(Some(id), Some(username), None)?
            }
            _ => {}
        }

        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        match update {
            ProfileUpdate::FullName(value) => user.full_name = value,
            ProfileUpdate::Email(value) => user.email = value,
            ProfileUpdate::Username(value) => user.username = value,
            ProfileUpdate::Avatar(value) => user.avatar = value,
            ProfileUpdate::CoverImage(value) => user.cover_image = value,
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.refresh_token_hash = hash.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn refresh_token_hash(&self, id: Uuid) -> StoreResult<Option<String>> {
        Ok(self
            .inner
            .read()
            .users
            .get(&id)
            .and_then(|user| user.refresh_token_hash.clone()))
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>> {
        let inner = self.inner.read();
        let Some(user) = inner.find(|user| user.username == username) else {
            return Ok(None);
        };

        let subscribers_count = inner
            .subscriptions
            .iter()
            .filter(|(_, channel)| *channel == user.id)
            .count() as i64;
        let channels_subscribed_to_count = inner
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == user.id)
            .count() as i64;
        let is_subscribed = inner.subscriptions.contains(&(viewer, user.id));

        Ok(Some(ChannelProfile {
            full_name: user.full_name,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            cover_image: user.cover_image,
            subscribers_count,
            channels_subscribed_to_count,
            is_subscribed,
        }))
    }

    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>> {
        let inner = self.inner.read();
        let Some(entries) = inner.history.get(&id) else {
            return Ok(Vec::new());
        };

        let mut watched: Vec<WatchedVideo> = entries
            .iter()
            .filter_map(|(video_id, watched_at)| {
                let video = inner.videos.get(video_id)?;
                let owner = inner.users.get(&video.owner_id)?;
                Some(WatchedVideo {
                    id: video.id,
                    title: video.title.clone(),
                    description: video.description.clone(),
                    thumbnail: video.thumbnail.clone(),
                    duration_secs: video.duration_secs,
                    views: video.views,
                    created_at: video.created_at,
                    watched_at: *watched_at,
                    owner: VideoOwner {
                        full_name: owner.full_name.clone(),
                        username: owner.username.clone(),
                        avatar: owner.avatar.clone(),
                    },
                })
            })
            .collect();
        watched.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        Ok(watched)
    }
}
