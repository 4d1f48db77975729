#![allow(dead_code)]

use account_server::models::{ApiResponse, UserView};
use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};

pub const BOUNDARY: &str = "X-ACCOUNT-SERVER-BOUNDARY";
pub const PASSWORD: &str = "supersecurepw";

/// Hand-assembled `multipart/form-data` body.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (ContentType, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let content_type =
            ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
        (content_type, self.body)
    }
}

pub fn registration(full_name: &str, username: &str, email: &str) -> Multipart {
    Multipart::new()
        .text("fullName", full_name)
        .text("username", username)
        .text("email", email)
        .text("password", PASSWORD)
        .file("avatar", "avatar.png", b"\x89PNG avatar bytes")
}

pub async fn register(client: &Client, username: &str, email: &str) -> UserView {
    let (content_type, body) = registration("Test User", username, email).finish();
    let response = client
        .post("/api/v1/auth/register")
        .header(content_type)
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let payload: ApiResponse<UserView> = response.into_json().await.expect("user payload");
    payload.data
}

/// Tokens handed out by a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn login(client: &Client, email: &str, password: &str) -> Session {
    let response = client
        .post("/api/v1/auth/login")
        .header(ContentType::JSON)
        .body(json!({ "email": email, "password": password }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let access_cookie = response
        .cookies()
        .get("accessToken")
        .map(|cookie| cookie.value().to_string())
        .expect("access cookie");
    let payload: Value = response.into_json().await.expect("login payload");
    let access_token = payload["data"]["accessToken"]
        .as_str()
        .expect("access token in body")
        .to_string();
    assert_eq!(access_cookie, access_token);

    Session {
        access_token,
        refresh_token: payload["data"]["refreshToken"]
            .as_str()
            .expect("refresh token in body")
            .to_string(),
    }
}

pub fn access_cookie(token: &str) -> Cookie<'static> {
    Cookie::new("accessToken", token.to_string())
}

pub fn refresh_cookie(token: &str) -> Cookie<'static> {
    Cookie::new("refreshToken", token.to_string())
}

pub async fn error_message(response: rocket::local::asynchronous::LocalResponse<'_>) -> String {
    let body: Value = response.into_json().await.expect("json error body");
    assert_eq!(body["success"], false);
    body["message"].as_str().unwrap_or_default().to_string()
}

/// Whether the response tells the client to drop cookie `name`.
pub fn removes_cookie(response: &rocket::local::asynchronous::LocalResponse<'_>, name: &str) -> bool {
    let prefix = format!("{name}=;");
    response
        .headers()
        .get("Set-Cookie")
        .any(|header| header.starts_with(&prefix))
}
