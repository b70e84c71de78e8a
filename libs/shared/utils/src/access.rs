//! Capability checks used by HTTP handlers.
//!
//! Role branching lives here and only here; the scheduling services never
//! look at who is calling.

use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// Admins and staff manage every doctor's hours; a doctor manages their own.
pub fn can_manage_availability(user: &User, doctor_id: Uuid) -> bool {
    match user.role() {
        Some(Role::Admin) | Some(Role::Staff) => true,
        Some(Role::Doctor) => Uuid::parse_str(&user.id).map(|id| id == doctor_id).unwrap_or(false),
        None => false,
    }
}

/// Confirming, completing, rescheduling and listing bookings is staff work.
pub fn can_manage_appointments(user: &User) -> bool {
    matches!(user.role(), Some(Role::Admin) | Some(Role::Staff))
}

/// Registering doctors and toggling their active flag.
pub fn can_manage_doctors(user: &User) -> bool {
    can_manage_appointments(user)
}

pub fn require(allowed: bool, action: &str) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Not allowed to {}", action)))
    }
}
