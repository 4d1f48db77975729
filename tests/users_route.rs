mod common;

use std::sync::Arc;

use account_server::models::{ApiResponse, ChannelProfile, UserView, WatchedVideo};
use account_server::store::MemoryUserStore;
use account_server::test_support::TestRocketBuilder;
use chrono::{Duration, Utc};
use common::{Multipart, PASSWORD, access_cookie, error_message, login, register};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;

struct Harness {
    client: Client,
    store: Arc<MemoryUserStore>,
    media: tempfile::TempDir,
}

async fn harness() -> Harness {
    let media = tempfile::tempdir().expect("media dir");
    let store = Arc::new(MemoryUserStore::new());
    let client = TestRocketBuilder::new()
        .mount_all_routes()
        .with_store(store.clone())
        .with_media_root(media.path())
        .untracked_client()
        .await;
    Harness {
        client,
        store,
        media,
    }
}

async fn patch_json<'c>(
    client: &'c Client,
    path: &str,
    token: &str,
    body: serde_json::Value,
) -> rocket::local::asynchronous::LocalResponse<'c> {
    client
        .patch(path.to_string())
        .cookie(access_cookie(token))
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await
}

#[tokio::test]
async fn profile_returns_the_authenticated_user() {
    let h = harness().await;
    let user = register(&h.client, "ada", "ada@x.com").await;
    let session = login(&h.client, "ada@x.com", PASSWORD).await;

    let response = h
        .client
        .get("/api/v1/user/profile")
        .cookie(access_cookie(&session.access_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("profile");
    assert_eq!(payload.data, user);
}

#[tokio::test]
async fn text_fields_update_with_validation_and_conflicts() {
    let h = harness().await;
    register(&h.client, "ada", "ada@x.com").await;
    register(&h.client, "grace", "grace@x.com").await;
    let session = login(&h.client, "ada@x.com", PASSWORD).await;
    let token = session.access_token.as_str();

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-fullname",
        token,
        json!({ "fullName": "  Augusta Ada King  " }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("user");
    assert_eq!(payload.data.full_name, "Augusta Ada King");

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-fullname",
        token,
        json!({ "fullName": "   " }),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-email",
        token,
        json!({ "email": "not an email" }),
    )
    .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-email",
        token,
        json!({ "email": "grace@x.com" }),
    )
    .await;
    assert_eq!(response.status(), Status::Conflict);

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-email",
        token,
        json!({ "email": "Countess@X.com" }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("user");
    assert_eq!(payload.data.email, "countess@x.com");

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-username",
        token,
        json!({ "username": "Grace" }),
    )
    .await;
    assert_eq!(response.status(), Status::Conflict);
    assert_eq!(
        error_message(response).await,
        "user with this username already exists"
    );

    let response = patch_json(
        &h.client,
        "/api/v1/user/change-username",
        token,
        json!({ "username": "countess" }),
    )
    .await;
    assert_eq!(response.status(), Status::Ok);

    login(&h.client, "countess@x.com", PASSWORD).await;
}

#[tokio::test]
async fn avatar_replacement_discards_the_previous_file() {
    let h = harness().await;
    let user = register(&h.client, "ada", "ada@x.com").await;
    let session = login(&h.client, "ada@x.com", PASSWORD).await;
    let old_file = h.media.path().join(user.avatar.trim_start_matches("/media/"));
    assert!(old_file.exists());

    let (content_type, body) = Multipart::new()
        .file("avatar", "new.png", b"new avatar")
        .finish();
    let response = h
        .client
        .patch("/api/v1/user/change-avatar")
        .cookie(access_cookie(&session.access_token))
        .header(content_type)
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("user");

    assert_ne!(payload.data.avatar, user.avatar);
    assert!(!old_file.exists(), "previous avatar removed");
    let new_file = h
        .media
        .path()
        .join(payload.data.avatar.trim_start_matches("/media/"));
    assert_eq!(std::fs::read(new_file).expect("new avatar"), b"new avatar");

    // Wrong field name: the cover image is missing.
    let (content_type, body) = Multipart::new()
        .file("avatar", "cover.png", b"cover")
        .finish();
    let response = h
        .client
        .patch("/api/v1/user/change-cover-image")
        .cookie(access_cookie(&session.access_token))
        .header(content_type)
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(error_message(response).await, "Cover image file is required");

    let (content_type, body) = Multipart::new()
        .file("coverImage", "cover.png", b"cover")
        .finish();
    let response = h
        .client
        .patch("/api/v1/user/change-cover-image")
        .cookie(access_cookie(&session.access_token))
        .header(content_type)
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("user");
    assert!(payload.data.cover_image.starts_with("/media/"));
}

#[tokio::test]
async fn channel_profile_counts_subscriptions() {
    let h = harness().await;
    let ada = register(&h.client, "ada", "ada@x.com").await;
    let grace = register(&h.client, "grace", "grace@x.com").await;
    let linus = register(&h.client, "linus", "linus@x.com").await;

    h.store.subscribe(grace.id, ada.id);
    h.store.subscribe(linus.id, ada.id);
    h.store.subscribe(ada.id, linus.id);

    let session = login(&h.client, "grace@x.com", PASSWORD).await;
    let response = h
        .client
        .get("/api/v1/channel/ADA")
        .cookie(access_cookie(&session.access_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: ApiResponse<ChannelProfile> = response.into_json().await.expect("channel");
    assert_eq!(payload.data.username, "ada");
    assert_eq!(payload.data.subscribers_count, 2);
    assert_eq!(payload.data.channels_subscribed_to_count, 1);
    assert!(payload.data.is_subscribed);

    let response = h
        .client
        .get("/api/v1/channel/linus")
        .cookie(access_cookie(&session.access_token))
        .dispatch()
        .await;
    let payload: ApiResponse<ChannelProfile> = response.into_json().await.expect("channel");
    assert_eq!(payload.data.subscribers_count, 1);
    assert!(!payload.data.is_subscribed);

    let response = h
        .client
        .get("/api/v1/channel/nobody")
        .cookie(access_cookie(&session.access_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let response = h.client.get("/api/v1/channel/ada").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[tokio::test]
async fn watch_history_lists_newest_first_with_owners() {
    let h = harness().await;
    let ada = register(&h.client, "ada", "ada@x.com").await;
    let grace = register(&h.client, "grace", "grace@x.com").await;

    let engines = h.store.add_video(ada.id, "Analytical Engines", 600);
    let compilers = h.store.add_video(grace.id, "Compilers", 900);
    let now = Utc::now();
    h.store.record_watch(grace.id, engines, now - Duration::minutes(10));
    h.store.record_watch(grace.id, compilers, now);

    let session = login(&h.client, "grace@x.com", PASSWORD).await;
    let response = h
        .client
        .get("/api/v1/user/history")
        .cookie(access_cookie(&session.access_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let payload: ApiResponse<Vec<WatchedVideo>> = response.into_json().await.expect("history");
    let titles: Vec<&str> = payload.data.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["Compilers", "Analytical Engines"]);
    assert_eq!(payload.data[1].owner.username, "ada");
    assert_eq!(payload.data[1].views, 1);
}
