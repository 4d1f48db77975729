use std::ops::Deref;

use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};

use crate::auth::{AuthError, AuthService};
use crate::error::FailureMessage;
use crate::models::UserView;

const INVALID_TOKEN_MESSAGE: &str = "invalid or expired access token";

/// The authenticated caller, resolved from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserView);

impl Deref for AuthUser {
    type Target = UserView;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(AuthUser(user)),
            Err(err) => {
                let status = err.status();
                let message = if err.is_internal() {
                    log::error!("authentication failed: {}", err);
                    err.public_message()
                } else if matches!(err, AuthError::Unauthorized) {
                    err.to_string()
                } else {
                    log::debug!("rejected access token: {}", err);
                    INVALID_TOKEN_MESSAGE.to_string()
                };
                request.local_cache(|| FailureMessage(Some(message)));
                Outcome::Error((status, err))
            }
        }
    }
}

async fn extract_user(request: &Request<'_>) -> Result<UserView, AuthError> {
    let service = request
        .guard::<&State<AuthService>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthService missing from state".into()))?;

    let cookie = request
        .cookies()
        .get(&service.config().access_cookie_name)
        .map(|cookie| cookie.value().to_string());
    let header = request.headers().get_one("Authorization");

    let token = resolve_access_token(cookie.as_deref(), header, None)
        .ok_or(AuthError::Unauthorized)?;

    service.authenticate(token).await
}

/// Pick the access token by precedence: cookie, then `Authorization:
/// Bearer`, then a body field. Blank candidates are skipped.
pub fn resolve_access_token<'a>(
    cookie: Option<&'a str>,
    authorization: Option<&'a str>,
    body_field: Option<&'a str>,
) -> Option<&'a str> {
    let from_cookie = cookie.map(str::trim).filter(|token| !token.is_empty());
    from_cookie
        .or_else(|| authorization.and_then(bearer_token))
        .or_else(|| body_field.map(str::trim).filter(|token| !token.is_empty()))
}

fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
