use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use doctor_cell::router::availability_routes;
use shared_utils::test_utils::{TestState, TestUser};

async fn get(state: &TestState, uri: &str, caller: &TestUser) -> (StatusCode, Value) {
    let app = availability_routes(state.app_state());
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", state.token_for(caller)))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn single_doctor_availability_uses_camel_case() {
    let state = TestState::new();
    let doctor = TestUser::doctor("Jackson Avery");
    let patient = TestUser::patient("Lexie Grey");
    state.add_user(&doctor).await;
    state.add_user(&patient).await;

    let (status, body) = get(&state, &format!("/{}?day=2030-01-16", doctor.id), &patient).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctorName"], "Jackson Avery");
    assert_eq!(body["availableTimes"][0], "2030-01-16T09:00:00");
    assert_eq!(body["availableTimes"].as_array().map(Vec::len), Some(12));
}

#[tokio::test]
async fn listing_every_doctor() {
    let state = TestState::new();
    let patient = TestUser::patient("April Kepner");
    state.add_user(&patient).await;
    state.add_user(&TestUser::doctor("Teddy Altman")).await;

    let (status, body) = get(&state, "/?day=2030-01-16", &patient).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_day_is_bad_request() {
    let state = TestState::new();
    let patient = TestUser::patient("Jo Wilson");

    let (status, body) = get(&state, "/", &patient).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let state = TestState::new();
    let patient = TestUser::patient("Maggie Pierce");

    let (status, body) = get(&state, &format!("/{}?day=2030-01-16", uuid::Uuid::new_v4()), &patient).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let state = TestState::new();
    let app = availability_routes(state.app_state());

    let request = Request::builder().uri("/?day=2030-01-16").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
