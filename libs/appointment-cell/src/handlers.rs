use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::clock_time;
use shared_models::error::AppError;
use shared_utils::access::{can_manage_appointments, require};

use crate::models::{
    AppointmentError, AppointmentFilter, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::router::SchedulingState;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DoctorsAtQuery {
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub since: Option<DateTime<Utc>>,
}

pub(crate) fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::SlotConflict => {
            AppError::Conflict("This time slot is no longer available".to_string())
        }
        e @ AppointmentError::InvalidStateTransition { .. } => AppError::Conflict(e.to_string()),
        AppointmentError::Timeout => {
            AppError::Timeout("Booking could not be completed in time, please retry".to_string())
        }
        AppointmentError::Storage(msg) => AppError::Database(msg),
    }
}

fn format_times(times: &[NaiveTime]) -> Vec<String> {
    times.iter().map(|t| t.format(clock_time::OUTPUT_FORMAT).to_string()).collect()
}

// ==============================================================================
// PUBLIC HANDLERS (BOOKING FLOW)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<SchedulingState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let schedule = state
        .scheduling
        .day_availability(doctor_id, query.date)
        .await
        .map_err(map_appointment_error)?;

    if !schedule.has_rules_for_day {
        return Err(AppError::NotFound(format!(
            "Doctor has no working hours on {}",
            query.date
        )));
    }

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "has_rules_for_day": schedule.has_rules_for_day,
        "on_leave": schedule.on_leave,
        "slots": schedule.slots,
        "total": schedule.slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_merged_slots(
    State(state): State<SchedulingState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let times = state
        .scheduling
        .merged_slot_times(query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "date": query.date,
        "times": format_times(&times)
    })))
}

#[axum::debug_handler]
pub async fn get_available_doctors(
    State(state): State<SchedulingState>,
    Query(query): Query<DoctorsAtQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = state
        .scheduling
        .available_doctors_at(query.date, query.time)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "date": query.date,
        "time": query.time.format(clock_time::OUTPUT_FORMAT).to_string(),
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<SchedulingState>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state
        .scheduling
        .book_appointment(request)
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

/// Public so patients can cancel from their confirmation link. Body is optional.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: CancelAppointmentRequest = if body.is_empty() {
        CancelAppointmentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid cancel request: {}", e)))?
    };

    let appointment = state
        .scheduling
        .cancel_appointment(appointment_id, request.reason)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// STAFF HANDLERS (AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "list appointments")?;

    let appointments = state
        .scheduling
        .list_appointments(&filter)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len(),
        "limit": filter.limit(),
        "offset": filter.offset()
    })))
}

#[axum::debug_handler]
pub async fn get_todays_appointments(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "view today's appointments")?;

    let appointments = state
        .scheduling
        .todays_appointments()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_notifications(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "view booking notifications")?;

    let page = state.feed.poll(query.since).await.map_err(map_appointment_error)?;
    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "view appointments")?;

    let appointment = state
        .scheduling
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !can_manage_appointments(&user) {
        warn!("User {} tried to confirm appointment {}", user.id, appointment_id);
        return Err(AppError::Forbidden("Only staff can confirm appointments".to_string()));
    }

    let appointment = state
        .scheduling
        .confirm_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "complete appointments")?;

    let appointment = state
        .scheduling
        .complete_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<SchedulingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_appointments(&user), "reschedule appointments")?;

    let appointment = state
        .scheduling
        .reschedule_appointment(appointment_id, request.date, request.start_time)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}
