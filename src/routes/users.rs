//! Profile endpoints for the authenticated caller.

use std::sync::Arc;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{FromForm, State, get, patch};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::auth::validation::{normalize, require_email};
use crate::error::ApiError;
use crate::media::{MediaStore, discard_quietly};
use crate::models::{ApiResponse, ProfileUpdate, UserView, WatchedVideo};
use crate::store::UserStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullNameRequest {
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsernameRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, FromForm)]
pub struct AvatarUpload<'r> {
    pub avatar: Option<TempFile<'r>>,
}

#[derive(Debug, FromForm)]
pub struct CoverImageUpload<'r> {
    #[field(name = "coverImage")]
    pub cover_image: Option<TempFile<'r>>,
}

type ProfileResult = Result<Json<ApiResponse<UserView>>, ApiError>;

#[get("/user/profile")]
pub fn current_user(user: AuthUser) -> Json<ApiResponse<UserView>> {
    Json(ApiResponse::ok(user.0, "Current user fetched successfully"))
}

#[patch("/user/change-fullname", data = "<payload>")]
pub async fn change_full_name(
    users: &State<Arc<dyn UserStore>>,
    user: AuthUser,
    payload: Json<FullNameRequest>,
) -> ProfileResult {
    let full_name = payload
        .into_inner()
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Full name is required".into()))?;

    let updated = apply(users.inner().as_ref(), &user, ProfileUpdate::FullName(full_name)).await?;
    Ok(Json(ApiResponse::ok(updated, "Full name updated successfully")))
}

#[patch("/user/change-email", data = "<payload>")]
pub async fn change_email(
    users: &State<Arc<dyn UserStore>>,
    user: AuthUser,
    payload: Json<EmailRequest>,
) -> ProfileResult {
    let email = payload.into_inner().email.unwrap_or_default();
    let email = require_email(&email)?;

    let updated = apply(users.inner().as_ref(), &user, ProfileUpdate::Email(email)).await?;
    Ok(Json(ApiResponse::ok(updated, "Email updated successfully")))
}

#[patch("/user/change-username", data = "<payload>")]
pub async fn change_username(
    users: &State<Arc<dyn UserStore>>,
    user: AuthUser,
    payload: Json<UsernameRequest>,
) -> ProfileResult {
    let username = payload
        .into_inner()
        .username
        .map(|name| normalize(&name))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Username is required".into()))?;

    let updated = apply(users.inner().as_ref(), &user, ProfileUpdate::Username(username)).await?;
    Ok(Json(ApiResponse::ok(updated, "Username updated successfully")))
}

#[patch("/user/change-avatar", data = "<form>")]
pub async fn change_avatar(
    users: &State<Arc<dyn UserStore>>,
    media: &State<Arc<dyn MediaStore>>,
    user: AuthUser,
    form: Form<AvatarUpload<'_>>,
) -> ProfileResult {
    let upload = form.into_inner().avatar;
    let updated = replace_media(
        users.inner().as_ref(),
        media.inner().as_ref(),
        &user,
        upload,
        "Avatar file is required",
        ProfileUpdate::Avatar,
    )
    .await?;

    discard_quietly(media.inner().as_ref(), &user.avatar).await;
    Ok(Json(ApiResponse::ok(updated, "Avatar updated successfully")))
}

#[patch("/user/change-cover-image", data = "<form>")]
pub async fn change_cover_image(
    users: &State<Arc<dyn UserStore>>,
    media: &State<Arc<dyn MediaStore>>,
    user: AuthUser,
    form: Form<CoverImageUpload<'_>>,
) -> ProfileResult {
    let upload = form.into_inner().cover_image;
    let updated = replace_media(
        users.inner().as_ref(),
        media.inner().as_ref(),
        &user,
        upload,
        "Cover image file is required",
        ProfileUpdate::CoverImage,
    )
    .await?;

    discard_quietly(media.inner().as_ref(), &user.cover_image).await;
    Ok(Json(ApiResponse::ok(updated, "Cover image updated successfully")))
}

#[get("/user/history")]
pub async fn watch_history(
    users: &State<Arc<dyn UserStore>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<WatchedVideo>>>, ApiError> {
    let history = users.watch_history(user.id).await?;
    Ok(Json(ApiResponse::ok(
        history,
        "Watch history fetched successfully",
    )))
}

async fn apply(
    users: &dyn UserStore,
    user: &AuthUser,
    update: ProfileUpdate,
) -> Result<UserView, ApiError> {
    users
        .update_profile(user.id, update)
        .await?
        .map(|record| record.view())
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// Store the upload and point the record at it. The new file is removed
/// again when the record update fails.
async fn replace_media(
    users: &dyn UserStore,
    media: &dyn MediaStore,
    user: &AuthUser,
    upload: Option<TempFile<'_>>,
    missing_message: &str,
    update: fn(String) -> ProfileUpdate,
) -> Result<UserView, ApiError> {
    let mut file = upload
        .filter(|file| file.len() > 0)
        .ok_or_else(|| ApiError::BadRequest(missing_message.to_string()))?;
    let reference = media.store(&mut file).await?;

    match apply(users, user, update(reference.clone())).await {
        Ok(updated) => Ok(updated),
        Err(err) => {
            discard_quietly(media, &reference).await;
            Err(err)
        }
    }
}
