use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    AvailabilityRule, CreateAvailabilityRequest, CreateLeaveRequest, DoctorError, DoctorLeave,
    RuleWindow, UpdateAvailabilityRequest, DEFAULT_SLOT_DURATION,
};
use crate::repository::{AvailabilityStore, DoctorDirectory};

/// Admin-side management of weekly rules and leaves.
///
/// Every rule mutation runs under one writer lock so the overlap check and
/// the write that follows it cannot interleave with another mutation.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
    directory: Arc<dyn DoctorDirectory>,
    writer: Mutex<()>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>, directory: Arc<dyn DoctorDirectory>) -> Self {
        Self {
            store,
            directory,
            writer: Mutex::new(()),
        }
    }

    pub async fn create_rule(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailabilityRule, DoctorError> {
        self.ensure_doctor(doctor_id).await?;

        let window = validate_window(RuleWindow {
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration: request.slot_duration.unwrap_or(DEFAULT_SLOT_DURATION),
        })?;

        let _guard = self.writer.lock().await;
        self.check_overlap(doctor_id, &window, None).await?;

        let rule = self.store.insert_rule(AvailabilityRule::new(doctor_id, window)).await?;
        info!(
            "Created availability rule {} for doctor {} (day {}, {}-{})",
            rule.id, doctor_id, rule.day_of_week, rule.start_time, rule.end_time
        );
        Ok(rule)
    }

    pub async fn list_rules(
        &self,
        doctor_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        debug!("Listing availability for doctor {} (inactive: {})", doctor_id, include_inactive);
        self.store.rules_for_doctor(doctor_id, include_inactive).await
    }

    /// Edits hours by retiring the old rule and inserting a replacement.
    pub async fn replace_rule(
        &self,
        doctor_id: Uuid,
        rule_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<AvailabilityRule, DoctorError> {
        let _guard = self.writer.lock().await;
        let current = self.owned_rule(doctor_id, rule_id).await?;
        if !current.is_active {
            return Err(DoctorError::Validation(
                "Only active availability can be edited".to_string(),
            ));
        }

        let window = validate_window(RuleWindow {
            day_of_week: request.day_of_week.unwrap_or(current.day_of_week),
            start_time: request.start_time.unwrap_or(current.start_time),
            end_time: request.end_time.unwrap_or(current.end_time),
            slot_duration: request.slot_duration.unwrap_or(current.slot_duration),
        })?;

        self.check_overlap(doctor_id, &window, Some(rule_id)).await?;

        self.store.set_rule_active(rule_id, false).await?;
        let replacement = match self.store.insert_rule(AvailabilityRule::new(doctor_id, window)).await {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Replacement for rule {} failed, restoring it: {}", rule_id, e);
                self.store.set_rule_active(rule_id, true).await?;
                return Err(e);
            }
        };

        info!("Replaced availability rule {} with {}", rule_id, replacement.id);
        Ok(replacement)
    }

    pub async fn deactivate_rule(&self, doctor_id: Uuid, rule_id: Uuid) -> Result<AvailabilityRule, DoctorError> {
        let _guard = self.writer.lock().await;
        self.owned_rule(doctor_id, rule_id).await?;

        let rule = self
            .store
            .set_rule_active(rule_id, false)
            .await?
            .ok_or_else(|| DoctorError::NotFound("Availability".to_string()))?;
        info!("Deactivated availability rule {} for doctor {}", rule_id, doctor_id);
        Ok(rule)
    }

    pub async fn activate_rule(&self, doctor_id: Uuid, rule_id: Uuid) -> Result<AvailabilityRule, DoctorError> {
        let _guard = self.writer.lock().await;
        let current = self.owned_rule(doctor_id, rule_id).await?;
        if current.is_active {
            return Ok(current);
        }

        self.check_overlap(doctor_id, &current.window(), Some(rule_id)).await?;

        let rule = self
            .store
            .set_rule_active(rule_id, true)
            .await?
            .ok_or_else(|| DoctorError::NotFound("Availability".to_string()))?;
        info!("Re-activated availability rule {} for doctor {}", rule_id, doctor_id);
        Ok(rule)
    }

    // ==============================================================================
    // LEAVES
    // ==============================================================================

    pub async fn add_leave(&self, doctor_id: Uuid, request: CreateLeaveRequest) -> Result<DoctorLeave, DoctorError> {
        self.ensure_doctor(doctor_id).await?;

        if request.start_date > request.end_date {
            return Err(DoctorError::Validation(
                "Leave start date must not be after end date".to_string(),
            ));
        }

        let leave = DoctorLeave {
            id: Uuid::new_v4(),
            doctor_id,
            start_date: request.start_date,
            end_date: request.end_date,
            reason: request.reason.filter(|r| !r.trim().is_empty()),
            created_at: Utc::now(),
        };

        let leave = self.store.insert_leave(leave).await?;
        info!(
            "Recorded leave {} for doctor {} ({} to {})",
            leave.id, doctor_id, leave.start_date, leave.end_date
        );
        Ok(leave)
    }

    pub async fn list_leaves(&self, doctor_id: Uuid) -> Result<Vec<DoctorLeave>, DoctorError> {
        self.store.leaves_for_doctor(doctor_id).await
    }

    pub async fn remove_leave(&self, doctor_id: Uuid, leave_id: Uuid) -> Result<(), DoctorError> {
        if !self.store.delete_leave(doctor_id, leave_id).await? {
            return Err(DoctorError::NotFound("Leave".to_string()));
        }
        info!("Removed leave {} for doctor {}", leave_id, doctor_id);
        Ok(())
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn ensure_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        match self.directory.get_doctor(doctor_id).await? {
            Some(_) => Ok(()),
            None => Err(DoctorError::NotFound("Doctor".to_string())),
        }
    }

    async fn owned_rule(&self, doctor_id: Uuid, rule_id: Uuid) -> Result<AvailabilityRule, DoctorError> {
        match self.store.get_rule(rule_id).await? {
            Some(rule) if rule.doctor_id == doctor_id => Ok(rule),
            _ => Err(DoctorError::NotFound("Availability".to_string())),
        }
    }

    async fn check_overlap(
        &self,
        doctor_id: Uuid,
        window: &RuleWindow,
        exclude: Option<Uuid>,
    ) -> Result<(), DoctorError> {
        let existing = self.store.active_rules_for_day(doctor_id, window.day_of_week).await?;

        if let Some(clash) = existing
            .iter()
            .filter(|r| Some(r.id) != exclude)
            .find(|r| r.window().overlaps(window))
        {
            warn!(
                "Rejected availability for doctor {}: overlaps rule {} ({}-{})",
                doctor_id, clash.id, clash.start_time, clash.end_time
            );
            return Err(DoctorError::RuleOverlap(format!(
                "{}-{}",
                clash.start_time.format("%H:%M"),
                clash.end_time.format("%H:%M")
            )));
        }

        Ok(())
    }
}

/// Day in 0..=6, start before end, and a positive duration that fits the window.
pub fn validate_window(window: RuleWindow) -> Result<RuleWindow, DoctorError> {
    if !(0..=6).contains(&window.day_of_week) {
        return Err(DoctorError::Validation(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    if window.start_time >= window.end_time {
        return Err(DoctorError::Validation("Start time must be before end time".to_string()));
    }

    if window.slot_duration <= 0 {
        return Err(DoctorError::Validation("Slot duration must be positive".to_string()));
    }

    let window_minutes = minutes_between(window.start_time, window.end_time);
    if window.slot_duration as i64 > window_minutes {
        return Err(DoctorError::Validation(format!(
            "Slot duration of {} minutes does not fit a {} minute window",
            window.slot_duration, window_minutes
        )));
    }

    Ok(window)
}

fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    (end - start).num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day: i32, start: (u32, u32), end: (u32, u32), duration: i32) -> RuleWindow {
        RuleWindow {
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            slot_duration: duration,
        }
    }

    #[test]
    fn test_validate_window_accepts_sane_hours() {
        assert!(validate_window(window(1, (9, 0), (17, 0), 30)).is_ok());
        assert!(validate_window(window(0, (9, 0), (9, 15), 15)).is_ok());
    }

    #[test]
    fn test_validate_window_rejections() {
        assert!(validate_window(window(7, (9, 0), (17, 0), 30)).is_err());
        assert!(validate_window(window(-1, (9, 0), (17, 0), 30)).is_err());
        assert!(validate_window(window(1, (17, 0), (9, 0), 30)).is_err());
        assert!(validate_window(window(1, (9, 0), (9, 0), 30)).is_err());
        assert!(validate_window(window(1, (9, 0), (17, 0), 0)).is_err());
        assert!(validate_window(window(1, (9, 0), (9, 20), 30)).is_err());
    }
}
