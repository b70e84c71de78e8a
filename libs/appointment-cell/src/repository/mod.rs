//! Appointment persistence.
//!
//! Both stores enforce the no-overlap invariant themselves: the in-memory
//! store checks on every write, the Supabase tables carry an exclusion
//! constraint whose violations come back as HTTP 409.
//!
//! Updates are conditional on the status the caller read, so a write based
//! on a stale read cannot move an appointment out of a terminal state.

mod memory;
mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentStatus};

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Ordered by date then start time.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;

    /// Pending and confirmed appointments for one doctor and date, by start time.
    async fn find_active(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Fails with `SlotConflict` if an active appointment already overlaps.
    /// `created_at` is assigned by the store at write time.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Persists status, schedule and cancellation fields of an existing row,
    /// only while its stored status is still `expected`. Otherwise fails with
    /// `InvalidStateTransition` from the current status.
    async fn update(
        &self,
        expected: AppointmentStatus,
        appointment: &Appointment,
    ) -> Result<Appointment, AppointmentError>;

    /// Pending appointments created strictly after `since`, newest first.
    async fn pending_created_after(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}
