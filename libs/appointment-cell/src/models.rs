use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError, Slot};
use shared_models::clock_time;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Half-open interval overlap on the same doctor and date.
    pub fn overlaps(&self, doctor_id: Uuid, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.doctor_id == doctor_id
            && self.date == date
            && self.start_time < end
            && start < self.end_time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Pending and confirmed appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Verb for moving an appointment into this status, used in error messages.
    pub fn action(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "reopen",
            AppointmentStatus::Confirmed => "confirm",
            AppointmentStatus::Completed => "complete",
            AppointmentStatus::Cancelled => "cancel",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PatientInfo {
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(flatten)]
    pub patient: PatientInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
}

/// Staff-side listing filter. Dates are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AppointmentFilter {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
            && self.start_date.map_or(true, |d| appointment.date >= d)
            && self.end_date.map_or(true, |d| appointment.date <= d)
    }
}

// ==============================================================================
// RESPONSES
// ==============================================================================

/// A doctor with a free slot at the requested time.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableDoctor {
    pub doctor: Doctor,
    pub slot: Slot,
}

/// One page of the staff notification feed, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Appointment>,
    /// Pass back as `since` to receive only newer bookings.
    pub next_cursor: Option<DateTime<Utc>>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment slot is already booked")]
    SlotConflict,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        action: &'static str,
    },

    #[error("Booking timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppointmentError {
    /// A conditional write found the row in `current` instead of the
    /// `expected` status it was read in. `next` is the status being written;
    /// equal to `expected` when only the schedule moves.
    pub fn stale_write(
        current: AppointmentStatus,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Self {
        let action = if next == expected { "reschedule" } else { next.action() };
        AppointmentError::InvalidStateTransition { from: current, action }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(what) => AppointmentError::NotFound(what),
            DoctorError::Validation(msg) | DoctorError::RuleOverlap(msg) => AppointmentError::Validation(msg),
            DoctorError::Storage(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::Storage(format!("Failed to parse stored appointment: {}", err))
    }
}
