use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{can_manage_availability, can_manage_doctors, require};

use crate::models::{
    CreateAvailabilityRequest, CreateDoctorRequest, CreateLeaveRequest, DoctorError,
    UpdateAvailabilityRequest, UpdateDoctorStatusRequest,
};
use crate::router::DoctorState;

pub(crate) fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        DoctorError::Validation(msg) => AppError::ValidationError(msg),
        DoctorError::RuleOverlap(msg) => {
            AppError::Conflict(format!("Availability overlaps existing hours {}", msg))
        }
        DoctorError::Storage(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

/// Active doctors, for patients choosing whom to book with.
#[axum::debug_handler]
pub async fn list_doctors(State(state): State<DoctorState>) -> Result<Json<Value>, AppError> {
    let doctors = state.doctors.list_active().await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability_public(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let rules = state
        .availability
        .list_rules(doctor_id, false)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": rules,
        "total": rules.len()
    })))
}

// ==============================================================================
// DOCTOR PROFILE (AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require(can_manage_doctors(&user), "register doctors")?;

    let doctor = state.doctors.create_doctor(request).await.map_err(map_doctor_error)?;

    Ok((StatusCode::CREATED, Json(json!(doctor))))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<DoctorState>,
    Extension(_user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.get_doctor(doctor_id).await.map_err(map_doctor_error)?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor_status(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_doctors(&user), "change doctor status")?;

    let doctor = state
        .doctors
        .set_active(doctor_id, request.is_active)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// AVAILABILITY MANAGEMENT (AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_all_availability(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "view this doctor's schedule")?;

    let rules = state
        .availability
        .list_rules(doctor_id, true)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": rules,
        "total": rules.len()
    })))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !can_manage_availability(&user, doctor_id) {
        warn!("User {} tried to edit availability of doctor {}", user.id, doctor_id);
        return Err(AppError::Forbidden("Not allowed to manage this doctor's availability".to_string()));
    }

    let rule = state
        .availability
        .create_rule(doctor_id, request)
        .await
        .map_err(map_doctor_error)?;

    Ok((StatusCode::CREATED, Json(json!(rule))))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path((doctor_id, rule_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "manage this doctor's availability")?;

    let rule = state
        .availability
        .replace_rule(doctor_id, rule_id, request)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "replaced": rule_id,
        "availability": rule
    })))
}

#[axum::debug_handler]
pub async fn activate_availability(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path((doctor_id, rule_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "manage this doctor's availability")?;

    let rule = state
        .availability
        .activate_rule(doctor_id, rule_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path((doctor_id, rule_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "manage this doctor's availability")?;

    let rule = state
        .availability
        .deactivate_rule(doctor_id, rule_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "message": "Availability deactivated",
        "availability": rule
    })))
}

// ==============================================================================
// LEAVES (AUTHENTICATED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_leaves(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "view this doctor's leaves")?;

    let leaves = state.availability.list_leaves(doctor_id).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "leaves": leaves
    })))
}

#[axum::debug_handler]
pub async fn create_leave(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require(can_manage_availability(&user, doctor_id), "manage this doctor's leaves")?;

    let leave = state
        .availability
        .add_leave(doctor_id, request)
        .await
        .map_err(map_doctor_error)?;

    Ok((StatusCode::CREATED, Json(json!(leave))))
}

#[axum::debug_handler]
pub async fn delete_leave(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Path((doctor_id, leave_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    require(can_manage_availability(&user, doctor_id), "manage this doctor's leaves")?;

    state
        .availability
        .remove_leave(doctor_id, leave_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "message": "Leave removed" })))
}
