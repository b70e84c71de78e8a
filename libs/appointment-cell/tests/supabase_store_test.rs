use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, PatientInfo,
};
use appointment_cell::repository::{AppointmentStore, SupabaseAppointmentStore};
use appointment_cell::services::{FixedClock, SchedulingService};
use doctor_cell::models::{AvailabilityRule, Doctor, RuleWindow};
use doctor_cell::repository::{AvailabilityStore, DoctorDirectory, InMemoryDoctorStore};
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        ..TestConfig::default().to_app_config()
    }
}

fn sample(doctor_id: Uuid) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        doctor_id,
        patient_name: "Sita".to_string(),
        patient_email: "sita@example.com".to_string(),
        patient_phone: "+9779800000000".to_string(),
        notes: None,
        date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        status: AppointmentStatus::Pending,
        cancellation_reason: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_find_active_queries_pending_and_confirmed() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("date", "eq.2030-01-07"))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                "2030-01-07",
                "09:00:00",
                "09:30:00",
                "confirmed",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let active = store
        .find_active(doctor_id, NaiveDate::from_ymd_opt(2030, 1, 7).unwrap())
        .await
        .unwrap();

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, AppointmentStatus::Confirmed);
    assert_eq!(active[0].end_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
}

#[tokio::test]
async fn test_insert_sends_representation_header() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let appointment = sample(doctor_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "start_time": "09:00:00", "status": "pending" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment.id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07",
                "09:00:00",
                "09:30:00",
                "pending",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let stored = store.insert(appointment.clone()).await.unwrap();

    assert_eq!(stored.id, appointment.id);
}

#[tokio::test]
async fn test_exclusion_violation_maps_to_slot_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "conflicting key value violates exclusion constraint \"appointments_no_overlap\"",
                "23P01",
            ),
        ))
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let result = store.insert(sample(Uuid::new_v4())).await;

    assert_matches!(result, Err(AppointmentError::SlotConflict));
}

#[tokio::test]
async fn test_update_patches_by_id() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let mut appointment = sample(doctor_id);
    appointment.status = AppointmentStatus::Cancelled;
    appointment.cancellation_reason = Some("Sick".to_string());

    let mut row = MockSupabaseResponses::appointment_row(
        &appointment.id.to_string(),
        &doctor_id.to_string(),
        "2030-01-07",
        "09:00:00",
        "09:30:00",
        "cancelled",
    );
    row["cancellation_reason"] = json!("Sick");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment.id)))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "cancelled", "cancellation_reason": "Sick" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let updated = store.update(AppointmentStatus::Pending, &appointment).await.unwrap();

    assert_eq!(updated.status, AppointmentStatus::Cancelled);
    assert_eq!(updated.cancellation_reason.as_deref(), Some("Sick"));
}

#[tokio::test]
async fn test_pending_feed_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let items = store.pending_created_after(Some(Utc::now()), 25).await.unwrap();

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_update_of_a_row_that_moved_on_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let mut appointment = sample(doctor_id);
    appointment.status = AppointmentStatus::Confirmed;

    // Nothing matches `status=eq.pending` any more
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment.id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07",
                "09:00:00",
                "09:30:00",
                "cancelled",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let result = store.update(AppointmentStatus::Pending, &appointment).await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStateTransition {
            from: AppointmentStatus::Cancelled,
            action: "confirm"
        })
    );
}

#[tokio::test]
async fn test_insert_leaves_timestamps_to_the_database() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let appointment = sample(doctor_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment.id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07",
                "09:00:00",
                "09:30:00",
                "pending",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    store.insert(appointment).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("created_at").is_none());
    assert!(body.get("updated_at").is_none());
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_missing_doctor_on_insert_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "insert or update on table \"appointments\" violates foreign key constraint",
                "23503",
            ),
        ))
        .mount(&mock_server)
        .await;

    let store = SupabaseAppointmentStore::new(&config_for(&mock_server));
    let result = store.insert(sample(Uuid::new_v4())).await;

    assert_matches!(result, Err(AppointmentError::NotFound(what)) if what == "Doctor");
}

#[tokio::test]
async fn test_slow_insert_outlasting_the_booking_timeout_is_awaited() {
    let mock_server = MockServer::start().await;
    let doctors = InMemoryDoctorStore::new();
    let doctor = doctors
        .insert_doctor(Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Adhikari".to_string(),
            specialization: None,
            is_active: true,
        })
        .await
        .unwrap();
    doctors
        .insert_rule(AvailabilityRule::new(
            doctor.id,
            RuleWindow {
                day_of_week: 1,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                slot_duration: 30,
            },
        ))
        .await
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_delay(Duration::from_millis(400))
                .set_body_json(json!([MockSupabaseResponses::appointment_row(
                    &Uuid::new_v4().to_string(),
                    &doctor.id.to_string(),
                    "2030-01-07",
                    "09:00:00",
                    "09:30:00",
                    "pending",
                )])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduling = SchedulingService::new(
        Arc::new(doctors.clone()),
        Arc::new(doctors.clone()),
        Arc::new(SupabaseAppointmentStore::new(&config_for(&mock_server))),
        Duration::from_millis(100),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock(
        NaiveDate::from_ymd_opt(2030, 1, 4).unwrap().and_hms_opt(8, 0, 0).unwrap(),
    )));

    let result = scheduling
        .book_appointment(BookAppointmentRequest {
            doctor_id: doctor.id,
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            patient: PatientInfo {
                patient_name: "Sita".to_string(),
                patient_email: "sita@example.com".to_string(),
                patient_phone: "+977 9800000000".to_string(),
                notes: None,
            },
        })
        .await;

    // The row reached the database, so the caller must hear about it
    let booked = result.unwrap();
    assert_eq!(booked.status, AppointmentStatus::Pending);
    assert_eq!(booked.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
}
