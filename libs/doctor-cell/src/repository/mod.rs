//! Storage seams for doctors, weekly availability and leaves.
//!
//! Two implementations exist: [`InMemoryDoctorStore`] for local development
//! and tests, and [`SupabaseDoctorStore`] backed by PostgREST tables.

mod memory;
mod supabase;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{AvailabilityRule, Doctor, DoctorError, DoctorLeave};

pub use memory::InMemoryDoctorStore;
pub use supabase::SupabaseDoctorStore;

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn rules_for_doctor(
        &self,
        doctor_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<AvailabilityRule>, DoctorError>;

    /// Active rules for one weekday, ordered by start time.
    async fn active_rules_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, DoctorError>;

    async fn get_rule(&self, rule_id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError>;

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError>;

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<AvailabilityRule>, DoctorError>;

    async fn leaves_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorLeave>, DoctorError>;

    async fn leave_covering(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorLeave>, DoctorError>;

    async fn insert_leave(&self, leave: DoctorLeave) -> Result<DoctorLeave, DoctorError>;

    /// Returns false when no such leave exists for the doctor.
    async fn delete_leave(&self, doctor_id: Uuid, leave_id: Uuid) -> Result<bool, DoctorError>;
}

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    async fn list_active_doctors(&self) -> Result<Vec<Doctor>, DoctorError>;

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError>;

    async fn set_doctor_active(
        &self,
        doctor_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Doctor>, DoctorError>;
}
