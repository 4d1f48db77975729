//! HTTP route handlers grouped by resource domain.
//!
//! Authentication endpoints live in [`crate::auth::routes`]; this module
//! holds the profile, channel and health handlers and assembles the full
//! route set mounted under `/api/v1`.

use rocket::{Catcher, Route};

use crate::auth;
use crate::error;

pub mod channels;
pub mod health;
pub mod users;

/// Every handler served under `/api/v1`.
pub fn api_routes() -> Vec<Route> {
    routes![
        health::health_check,
        // Auth routes
        auth::routes::register,
        auth::routes::login,
        auth::routes::logout,
        auth::routes::refresh,
        auth::routes::change_password,
        // Profile routes
        users::current_user,
        users::change_full_name,
        users::change_email,
        users::change_username,
        users::change_avatar,
        users::change_cover_image,
        users::watch_history,
        // Channel routes
        channels::channel_profile,
    ]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![error::default_catcher]
}
