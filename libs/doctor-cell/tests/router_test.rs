use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::repository::{DoctorDirectory, InMemoryDoctorStore};
use doctor_cell::router::{doctor_routes, DoctorState};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    doctor_id: Uuid,
    secret: String,
}

async fn create_test_app() -> TestApp {
    let config = TestConfig::default();
    let store = InMemoryDoctorStore::new();
    let doctor = store
        .insert_doctor(Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Karki".to_string(),
            specialization: None,
            is_active: true,
        })
        .await
        .unwrap();

    let state = DoctorState::new(config.to_arc(), Arc::new(store.clone()), Arc::new(store));

    TestApp {
        router: doctor_routes(state),
        doctor_id: doctor.id,
        secret: config.jwt_secret,
    }
}

fn json_request(method: &str, uri: &str, auth: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_staff_creates_availability_and_public_reads_it() {
    let app = create_test_app().await;
    let staff = TestUser::staff("desk@clinic.test");

    let create = json_request(
        "POST",
        &format!("/{}/availability", app.doctor_id),
        Some(JwtTestUtils::bearer(&staff, &app.secret)),
        json!({ "day_of_week": 1, "start_time": "09:00", "end_time": "12:00", "slot_duration": 30 }),
    );
    let response = app.router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let rule = read_json(response).await;
    assert_eq!(rule["start_time"], "09:00");

    let public = Request::builder()
        .uri(format!("/{}/availability", app.doctor_id))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(public).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["total"], 1);
}

#[tokio::test]
async fn test_overlapping_availability_returns_conflict() {
    let app = create_test_app().await;
    let staff = TestUser::staff("desk@clinic.test");
    let uri = format!("/{}/availability", app.doctor_id);

    let first = json_request(
        "POST",
        &uri,
        Some(JwtTestUtils::bearer(&staff, &app.secret)),
        json!({ "day_of_week": 3, "start_time": "09:00", "end_time": "12:00" }),
    );
    assert_eq!(app.router.clone().oneshot(first).await.unwrap().status(), StatusCode::CREATED);

    let second = json_request(
        "POST",
        &uri,
        Some(JwtTestUtils::bearer(&staff, &app.secret)),
        json!({ "day_of_week": 3, "start_time": "11:30", "end_time": "13:00" }),
    );
    let response = app.router.clone().oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(read_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_invalid_window_returns_bad_request() {
    let app = create_test_app().await;
    let staff = TestUser::staff("desk@clinic.test");

    let request = json_request(
        "POST",
        &format!("/{}/availability", app.doctor_id),
        Some(JwtTestUtils::bearer(&staff, &app.secret)),
        json!({ "day_of_week": 1, "start_time": "12:00", "end_time": "09:00" }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = create_test_app().await;

    let request = json_request(
        "POST",
        &format!("/{}/availability", app.doctor_id),
        None,
        json!({ "day_of_week": 1, "start_time": "09:00", "end_time": "12:00" }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_cannot_edit_colleague_hours() {
    let app = create_test_app().await;
    let colleague = TestUser::doctor("other@clinic.test");

    let request = json_request(
        "POST",
        &format!("/{}/availability", app.doctor_id),
        Some(JwtTestUtils::bearer(&colleague, &app.secret)),
        json!({ "day_of_week": 1, "start_time": "09:00", "end_time": "12:00" }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_doctor_manages_own_leave() {
    let app = create_test_app().await;
    let doctor = TestUser::doctor_with_id("karki@clinic.test", app.doctor_id);

    let request = json_request(
        "POST",
        &format!("/{}/leaves", app.doctor_id),
        Some(JwtTestUtils::bearer(&doctor, &app.secret)),
        json!({ "start_date": "2030-05-01", "end_date": "2030-05-03", "reason": "Holiday" }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let leave_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/{}/leaves/{}", app.doctor_id, leave_id))
        .header("authorization", JwtTestUtils::bearer(&doctor, &app.secret))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deactivated_doctor_status_roundtrip() {
    let app = create_test_app().await;
    let admin = TestUser::admin("root@clinic.test");

    let request = json_request(
        "PATCH",
        &format!("/{}/status", app.doctor_id),
        Some(JwtTestUtils::bearer(&admin, &app.secret)),
        json!({ "is_active": false }),
    );
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["is_active"], false);
}

#[tokio::test]
async fn test_public_listing_shows_only_active_doctors() {
    let app = create_test_app().await;
    let admin = TestUser::admin("root@clinic.test");
    let listing = || Request::builder().uri("/").body(Body::empty()).unwrap();

    let response = app.router.clone().oneshot(listing()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["doctors"][0]["id"], app.doctor_id.to_string());

    let deactivate = json_request(
        "PATCH",
        &format!("/{}/status", app.doctor_id),
        Some(JwtTestUtils::bearer(&admin, &app.secret)),
        json!({ "is_active": false }),
    );
    assert_eq!(app.router.clone().oneshot(deactivate).await.unwrap().status(), StatusCode::OK);

    let response = app.router.oneshot(listing()).await.unwrap();
    assert_eq!(read_json(response).await["total"], 0);
}
