use account_server::models::ApiResponse;
use account_server::request_logger::REQUEST_ID_HEADER;
use account_server::routes::health::{HealthResponse, health_check};
use account_server::test_support::TestRocketBuilder;
use rocket::http::Status;
use rocket::routes;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/api/v1/health").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.headers().get_one(REQUEST_ID_HEADER).is_some());

    let payload: ApiResponse<HealthResponse> = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status_code, 200);
    assert!(payload.success);
    assert_eq!(payload.data.status, "ok");
}

#[test]
fn unknown_routes_render_json_errors() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/api/v1/nope").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let body: serde_json::Value = response.into_json().expect("json error body");
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["success"], false);
}
