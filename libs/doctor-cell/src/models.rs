use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::clock_time;

/// Minutes per slot when the admin form leaves the field empty.
pub const DEFAULT_SLOT_DURATION: i32 = 15;

// ==============================================================================
// DOCTORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDoctorStatusRequest {
    pub is_active: bool,
}

// ==============================================================================
// WEEKLY AVAILABILITY
// ==============================================================================

/// A recurring weekly working window. `day_of_week` runs Sunday=0 .. Saturday=6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub slot_duration: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityRule {
    pub fn new(doctor_id: Uuid, window: RuleWindow) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: window.day_of_week,
            start_time: window.start_time,
            end_time: window.end_time,
            slot_duration: window.slot_duration,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> RuleWindow {
        RuleWindow {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            slot_duration: self.slot_duration,
        }
    }
}

/// The validated shape of a rule, independent of identity and lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleWindow {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration: i32,
}

impl RuleWindow {
    /// Half-open overlap; windows that only touch do not overlap.
    pub fn overlaps(&self, other: &RuleWindow) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i32,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub slot_duration: Option<i32>,
}

/// Editing hours replaces the rule; omitted fields keep the old values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub day_of_week: Option<i32>,
    #[serde(default, with = "clock_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time::option")]
    pub end_time: Option<NaiveTime>,
    pub slot_duration: Option<i32>,
}

// ==============================================================================
// LEAVES
// ==============================================================================

/// Dated days off. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorLeave {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DoctorLeave {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeaveRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

// ==============================================================================
// SLOTS
// ==============================================================================

/// A bookable interval derived from a rule. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Candidate slots for one doctor on one date, with the reasons a day may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub has_rules_for_day: bool,
    pub on_leave: bool,
    pub slots: Vec<Slot>,
}

/// Sunday=0 .. Saturday=6, the numbering used by the availability table.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Availability overlaps an existing active rule: {0}")]
    RuleOverlap(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(err: serde_json::Error) -> Self {
        DoctorError::Storage(format!("Failed to parse stored record: {}", err))
    }
}
