use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Data, Request, Response};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Per-request id and start time, cached on the request.
struct RequestTrace {
    id: String,
    started: Instant,
}

impl RequestTrace {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            started: Instant::now(),
        }
    }
}

/// Fairing to log one line per HTTP request with timing and a request id
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(RequestTrace::start);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let trace = request.local_cache(RequestTrace::start);
        let duration = trace.started.elapsed();

        response.set_header(Header::new(REQUEST_ID_HEADER, trace.id.clone()));

        // Query strings are left out; they may carry credentials.
        log::info!(
            "[{}] {} {} -> {} ({:.2}ms)",
            trace.id,
            request.method(),
            request.uri().path(),
            response.status().code,
            duration.as_secs_f64() * 1000.0
        );
    }
}
