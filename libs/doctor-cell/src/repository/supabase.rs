use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{
    supabase_error, SupabaseClient, SupabaseError, EXCLUSION_VIOLATION, FOREIGN_KEY_VIOLATION,
};
use shared_models::clock_time::STORAGE_FORMAT;

use crate::models::{AvailabilityRule, Doctor, DoctorError, DoctorLeave};

use super::{AvailabilityStore, DoctorDirectory};

const DOCTORS: &str = "/rest/v1/doctors";
const AVAILABILITY: &str = "/rest/v1/doctor_availability";
const LEAVES: &str = "/rest/v1/doctor_leaves";

/// PostgREST-backed store. Requests go out with the service's anon key.
pub struct SupabaseDoctorStore {
    supabase: SupabaseClient,
}

impl SupabaseDoctorStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn select<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DoctorError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(map_storage_error)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(DoctorError::from))
            .collect()
    }

    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<T>, DoctorError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                method,
                path,
                None,
                body,
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(map_storage_error)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(DoctorError::from))
            .collect()
    }
}

fn map_storage_error(err: anyhow::Error) -> DoctorError {
    match supabase_error(&err) {
        Some(conflict @ SupabaseError::Conflict(_)) => match conflict.pg_code().as_deref() {
            Some(EXCLUSION_VIOLATION) => DoctorError::RuleOverlap(conflict.to_string()),
            Some(FOREIGN_KEY_VIOLATION) => DoctorError::NotFound("Doctor".to_string()),
            _ => DoctorError::Storage(err.to_string()),
        },
        _ => DoctorError::Storage(err.to_string()),
    }
}

fn first<T>(mut rows: Vec<T>, what: &str) -> Result<T, DoctorError> {
    if rows.is_empty() {
        return Err(DoctorError::Storage(format!("{} write returned no rows", what)));
    }
    Ok(rows.swap_remove(0))
}

fn rule_row(rule: &AvailabilityRule) -> Value {
    json!({
        "id": rule.id,
        "doctor_id": rule.doctor_id,
        "day_of_week": rule.day_of_week,
        "start_time": rule.start_time.format(STORAGE_FORMAT).to_string(),
        "end_time": rule.end_time.format(STORAGE_FORMAT).to_string(),
        "slot_duration": rule.slot_duration,
        "is_active": rule.is_active,
        "created_at": rule.created_at.to_rfc3339(),
        "updated_at": rule.updated_at.to_rfc3339()
    })
}

#[async_trait]
impl AvailabilityStore for SupabaseDoctorStore {
    async fn rules_for_doctor(
        &self,
        doctor_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let mut path = format!(
            "{}?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            AVAILABILITY, doctor_id
        );
        if !include_inactive {
            path.push_str("&is_active=eq.true");
        }
        self.select(&path).await
    }

    async fn active_rules_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let path = format!(
            "{}?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            AVAILABILITY, doctor_id, day_of_week
        );
        self.select(&path).await
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        let path = format!("{}?id=eq.{}", AVAILABILITY, rule_id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        debug!("Inserting availability rule {} for doctor {}", rule.id, rule.doctor_id);
        let rows = self.write(Method::POST, AVAILABILITY, Some(rule_row(&rule))).await?;
        first(rows, "availability")
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<AvailabilityRule>, DoctorError> {
        let path = format!("{}?id=eq.{}", AVAILABILITY, rule_id);
        let body = json!({
            "is_active": is_active,
            "updated_at": Utc::now().to_rfc3339()
        });
        Ok(self.write(Method::PATCH, &path, Some(body)).await?.into_iter().next())
    }

    async fn leaves_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorLeave>, DoctorError> {
        let path = format!("{}?doctor_id=eq.{}&order=start_date.asc", LEAVES, doctor_id);
        self.select(&path).await
    }

    async fn leave_covering(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorLeave>, DoctorError> {
        let path = format!(
            "{}?doctor_id=eq.{}&start_date=lte.{}&end_date=gte.{}&limit=1",
            LEAVES, doctor_id, date, date
        );
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn insert_leave(&self, leave: DoctorLeave) -> Result<DoctorLeave, DoctorError> {
        let body = json!({
            "id": leave.id,
            "doctor_id": leave.doctor_id,
            "start_date": leave.start_date,
            "end_date": leave.end_date,
            "reason": leave.reason,
            "created_at": leave.created_at.to_rfc3339()
        });
        let rows = self.write(Method::POST, LEAVES, Some(body)).await?;
        first(rows, "leave")
    }

    async fn delete_leave(&self, doctor_id: Uuid, leave_id: Uuid) -> Result<bool, DoctorError> {
        let path = format!("{}?id=eq.{}&doctor_id=eq.{}", LEAVES, leave_id, doctor_id);
        let deleted: Vec<DoctorLeave> = self.write(Method::DELETE, &path, None).await?;
        Ok(!deleted.is_empty())
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS, doctor_id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn list_active_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("{}?is_active=eq.true&order=name.asc", DOCTORS);
        self.select(&path).await
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let body = serde_json::to_value(&doctor)?;
        let rows = self.write(Method::POST, DOCTORS, Some(body)).await?;
        first(rows, "doctor")
    }

    async fn set_doctor_active(
        &self,
        doctor_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("{}?id=eq.{}", DOCTORS, doctor_id);
        let body = json!({ "is_active": is_active });
        Ok(self.write(Method::PATCH, &path, Some(body)).await?.into_iter().next())
    }
}
