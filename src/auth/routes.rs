use std::sync::Arc;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status;
use rocket::serde::json::{Json, Value, json};
use rocket::{State, post};
use time::Duration as TimeDuration;

use crate::auth::guards::AuthUser;
use crate::auth::responses::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterForm,
    TokenPairResponse,
};
use crate::auth::service::{IssuedTokens, Registration};
use crate::auth::{AuthConfig, AuthError, AuthResult, AuthService};
use crate::media::{MediaStore, discard_quietly};
use crate::models::{ApiResponse, ErrorBody, UserView};

type ErrorResponse = status::Custom<Json<ErrorBody>>;
type AuthRouteResult<T> = Result<Json<ApiResponse<T>>, ErrorResponse>;

#[post("/auth/register", data = "<form>")]
pub async fn register(
    service: &State<AuthService>,
    media: &State<Arc<dyn MediaStore>>,
    form: Form<RegisterForm<'_>>,
) -> Result<status::Custom<Json<ApiResponse<UserView>>>, ErrorResponse> {
    let form = form.into_inner();
    let media = media.inner().as_ref();

    let avatar = store_upload(media, form.avatar)
        .await
        .map_err(respond_error)?;
    let cover_image = match store_upload(media, form.cover_image).await {
        Ok(cover_image) => cover_image,
        Err(err) => {
            discard_uploads(media, [avatar.as_deref()]).await;
            return Err(respond_error(err));
        }
    };

    let registration = Registration {
        full_name: form.full_name.unwrap_or_default(),
        username: form.username.unwrap_or_default(),
        email: form.email.unwrap_or_default(),
        password: form.password.unwrap_or_default(),
        avatar: avatar.clone(),
        cover_image: cover_image.clone(),
    };

    match service.register(registration).await {
        Ok(user) => Ok(status::Custom(
            Status::Created,
            Json(ApiResponse::new(
                Status::Created,
                user,
                "User registered successfully",
            )),
        )),
        Err(err) => {
            discard_uploads(media, [avatar.as_deref(), cover_image.as_deref()]).await;
            Err(respond_error(err))
        }
    }
}

#[post("/auth/login", data = "<payload>")]
pub async fn login(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<LoginResponse> {
    let outcome = service
        .login(&payload.email, &payload.password)
        .await
        .map_err(respond_error)?;

    set_token_cookies(cookies, service.config(), &outcome.tokens);

    let response = LoginResponse {
        tokens: TokenPairResponse::from(&outcome.tokens),
        user: outcome.user,
    };

    Ok(Json(ApiResponse::ok(response, "User logged in successfully")))
}

#[post("/auth/logout")]
pub async fn logout(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
    user: AuthUser,
) -> AuthRouteResult<Value> {
    service.logout(user.id).await.map_err(respond_error)?;
    clear_token_cookies(cookies, service.config());

    Ok(Json(ApiResponse::ok(json!({}), "User logged out successfully")))
}

#[post("/auth/get-access-token", data = "<payload>")]
pub async fn refresh(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
    payload: Option<Json<RefreshRequest>>,
) -> AuthRouteResult<TokenPairResponse> {
    let from_cookie = cookies
        .get(&service.config().refresh_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.trim().is_empty());
    let from_body = payload.and_then(|payload| payload.into_inner().refresh_token);
    let incoming = from_cookie.or(from_body);

    match service.refresh(incoming.as_deref()).await {
        Ok(tokens) => {
            set_token_cookies(cookies, service.config(), &tokens);
            Ok(Json(ApiResponse::ok(
                TokenPairResponse::from(&tokens),
                "Access token refreshed",
            )))
        }
        Err(err) => {
            if err.status() == Status::Unauthorized {
                clear_token_cookies(cookies, service.config());
            }
            Err(respond_error(err))
        }
    }
}

#[post("/user/change-password", data = "<payload>")]
pub async fn change_password(
    service: &State<AuthService>,
    cookies: &CookieJar<'_>,
    user: AuthUser,
    payload: Json<ChangePasswordRequest>,
) -> AuthRouteResult<Value> {
    let payload = payload.into_inner();
    service
        .change_password(
            user.id,
            payload.old_password.as_deref(),
            payload.new_password.as_deref(),
        )
        .await
        .map_err(respond_error)?;

    if service.config().revoke_sessions_on_password_change {
        remove_cookie(cookies, service.config(), &service.config().refresh_cookie_name);
    }

    Ok(Json(ApiResponse::ok(json!({}), "Password changed successfully")))
}

pub(crate) fn respond_error(err: AuthError) -> ErrorResponse {
    let status = err.status();
    if err.is_internal() {
        log::error!("auth request failed: {}", err);
    } else {
        log::debug!("auth request rejected: {}", err);
    }
    status::Custom(status, Json(ErrorBody::new(status, err.public_message())))
}

async fn store_upload(
    media: &dyn MediaStore,
    upload: Option<TempFile<'_>>,
) -> AuthResult<Option<String>> {
    match upload {
        Some(mut file) if file.len() > 0 => Ok(Some(media.store(&mut file).await?)),
        _ => Ok(None),
    }
}

async fn discard_uploads<const N: usize>(media: &dyn MediaStore, references: [Option<&str>; N]) {
    for reference in references.into_iter().flatten() {
        discard_quietly(media, reference).await;
    }
}

fn set_token_cookies(cookies: &CookieJar<'_>, config: &AuthConfig, tokens: &IssuedTokens) {
    add_cookie(
        cookies,
        config,
        &config.access_cookie_name,
        &tokens.access.token,
        config.access_token_ttl_secs,
    );
    add_cookie(
        cookies,
        config,
        &config.refresh_cookie_name,
        &tokens.refresh.token,
        config.refresh_token_ttl_secs,
    );
}

fn add_cookie(
    cookies: &CookieJar<'_>,
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age_secs: i64,
) {
    let mut cookie = Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(TimeDuration::seconds(max_age_secs))
        .build();

    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }

    cookies.add(cookie);
}

fn clear_token_cookies(cookies: &CookieJar<'_>, config: &AuthConfig) {
    remove_cookie(cookies, config, &config.access_cookie_name);
    remove_cookie(cookies, config, &config.refresh_cookie_name);
}

fn remove_cookie(cookies: &CookieJar<'_>, config: &AuthConfig, name: &str) {
    let mut cookie = Cookie::build((name.to_string(), String::new()))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .removal()
        .build();

    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }

    cookies.add(cookie);
}
