use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment state machine.
///
/// `pending -> confirmed -> completed` and `pending|confirmed -> cancelled`.
/// Completed and cancelled are terminal.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidStateTransition {
                from: current,
                action: next.action(),
            });
        }

        debug!("Status transition validated: {} -> {}", current, next);
        Ok(())
    }
}
