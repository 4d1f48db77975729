use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Request, Response, catch};
use std::io::Cursor;

use crate::auth::AuthError;
use crate::media::MediaError;
use crate::models::ErrorBody;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    StoreError(StoreError),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    InternalError(String),
}

/// Message left in the request-local cache by a failing guard, rendered by
/// the default catcher.
#[derive(Debug, Default)]
pub struct FailureMessage(pub Option<String>);

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, message) = match self {
            ApiError::StoreError(e) => {
                log::error!("store error: {}", e);
                (Status::InternalServerError, "internal server error".to_string())
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, msg)
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, msg)
            }
            ApiError::Conflict(msg) => {
                log::debug!("conflict: {}", msg);
                (Status::Conflict, msg)
            }
            ApiError::Unauthorized(msg) => {
                log::debug!("unauthorized: {}", msg);
                (Status::Unauthorized, msg)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (Status::InternalServerError, "internal server error".to_string())
            }
        };

        json_error(status, message)
    }
}

fn json_error(status: Status, message: String) -> response::Result<'static> {
    let json = serde_json::to_string(&ErrorBody::new(status, message)).unwrap_or_else(|_| {
        r#"{"statusCode":500,"message":"Failed to serialize error","success":false}"#.to_string()
    });

    Response::build()
        .status(status)
        .header(ContentType::JSON)
        .sized_body(json.len(), Cursor::new(json))
        .ok()
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => {
                ApiError::Conflict(format!("user with this {field} already exists"))
            }
            other => ApiError::StoreError(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        let message = err.public_message();
        match err {
            AuthError::Store(store_err) => ApiError::StoreError(store_err),
            _ if status == Status::BadRequest => ApiError::BadRequest(message),
            _ if status == Status::Conflict => ApiError::Conflict(message),
            _ if status == Status::NotFound => ApiError::NotFound(message),
            _ if status == Status::Unauthorized => ApiError::Unauthorized(message),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::EmptyUpload => ApiError::BadRequest(err.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

/// Renders every unhandled status in the JSON error envelope, using the
/// guard's message when one was recorded.
#[catch(default)]
pub fn default_catcher(status: Status, request: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let recorded = &request.local_cache(FailureMessage::default).0;
    let message = recorded
        .clone()
        .unwrap_or_else(|| status.reason_lossy().to_lowercase());
    (status, Json(ErrorBody::new(status, message)))
}
