use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    ChannelProfile, NewUser, ProfileUpdate, UserRecord, VideoOwner, WatchedVideo,
};
use crate::store::{StoreError, StoreResult, UserStore};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password_hash, \
     refresh_token_hash, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<UserRecord>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let sql = format!(
            "INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.avatar)
            .bind(user.cover_image.as_deref().unwrap_or_default())
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> StoreResult<Option<UserRecord>> {
        let (column, value) = match update {
            ProfileUpdate::FullName(value) => ("full_name", value),
            ProfileUpdate::Email(value) => ("email", value),
            ProfileUpdate::Username(value) => ("username", value),
            ProfileUpdate::Avatar(value) => ("avatar", value),
            ProfileUpdate::CoverImage(value) => ("cover_image", value),
        };
        let sql = format!(
            "UPDATE users SET {column} = $1, updated_at = now() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(value)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET refresh_token_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn refresh_token_hash(&self, id: Uuid) -> StoreResult<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT refresh_token_hash FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash.flatten())
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Uuid,
    ) -> StoreResult<Option<ChannelProfile>> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.full_name, u.username, u.email, u.avatar, u.cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channels_subscribed_to_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.channel_id = u.id AND s.subscriber_id = $2
                   ) AS is_subscribed
            FROM users u
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn watch_history(&self, id: Uuid) -> StoreResult<Vec<WatchedVideo>> {
        let rows = sqlx::query_as::<_, WatchRow>(
            r#"
            SELECT v.id, v.title, v.description, v.thumbnail, v.duration_secs, v.views,
                   v.created_at, w.watched_at,
                   o.full_name AS owner_full_name,
                   o.username AS owner_username,
                   o.avatar AS owner_avatar
            FROM watch_history w
            JOIN videos v ON v.id = w.video_id
            JOIN users o ON o.id = v.owner_id
            WHERE w.user_id = $1
            ORDER BY w.watched_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WatchRow::into_video).collect())
    }
}

#[derive(Debug, FromRow)]
struct WatchRow {
    id: Uuid,
    title: String,
    description: String,
    thumbnail: String,
    duration_secs: i32,
    views: i64,
    created_at: DateTime<Utc>,
    watched_at: DateTime<Utc>,
    owner_full_name: String,
    owner_username: String,
    owner_avatar: String,
}

impl WatchRow {
    fn into_video(self) -> WatchedVideo {
        WatchedVideo {
            id: self.id,
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            duration_secs: self.duration_secs,
            views: self.views,
            created_at: self.created_at,
            watched_at: self.watched_at,
            owner: VideoOwner {
                full_name: self.owner_full_name,
                username: self.owner_username,
                avatar: self.owner_avatar,
            },
        }
    }
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some("users_email_unique") => StoreError::Duplicate("email"),
                _ => StoreError::Duplicate("username"),
            };
        }
    }
    StoreError::Sqlx(err)
}
