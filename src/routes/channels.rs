use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{State, get};

use crate::auth::AuthUser;
use crate::auth::validation::normalize;
use crate::error::ApiError;
use crate::models::{ApiResponse, ChannelProfile};
use crate::store::UserStore;

/// Public channel view of `username`, seen from the caller's perspective.
#[get("/channel/<username>")]
pub async fn channel_profile(
    users: &State<Arc<dyn UserStore>>,
    user: AuthUser,
    username: &str,
) -> Result<Json<ApiResponse<ChannelProfile>>, ApiError> {
    let username = normalize(username);
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is missing".into()));
    }

    let channel = users
        .channel_profile(&username, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel does not exist".into()))?;

    Ok(Json(ApiResponse::ok(
        channel,
        "User channel fetched successfully",
    )))
}
