use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{
    supabase_error, SupabaseClient, SupabaseError, EXCLUSION_VIOLATION, FOREIGN_KEY_VIOLATION,
};
use shared_models::clock_time::STORAGE_FORMAT;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentStatus};

use super::AppointmentStore;

const APPOINTMENTS: &str = "/rest/v1/appointments";

pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(map_storage_error)?;
        parse_rows(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                method,
                path,
                None,
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(map_storage_error)?;

        parse_rows(rows)
    }
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(AppointmentError::from))
        .collect()
}

/// The exclusion constraint on active appointments surfaces as 409, and
/// so does a booking for a doctor row that does not exist.
fn map_storage_error(err: anyhow::Error) -> AppointmentError {
    match supabase_error(&err) {
        Some(conflict @ SupabaseError::Conflict(_)) => match conflict.pg_code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => AppointmentError::NotFound("Doctor".to_string()),
            Some(EXCLUSION_VIOLATION) | None => {
                warn!("Database rejected overlapping appointment: {}", conflict);
                AppointmentError::SlotConflict
            }
            Some(_) => AppointmentError::Storage(err.to_string()),
        },
        Some(SupabaseError::NotFound(_)) => AppointmentError::NotFound("Appointment".to_string()),
        _ => AppointmentError::Storage(err.to_string()),
    }
}

fn appointment_row(appointment: &Appointment) -> Value {
    json!({
        "id": appointment.id,
        "doctor_id": appointment.doctor_id,
        "patient_name": appointment.patient_name,
        "patient_email": appointment.patient_email,
        "patient_phone": appointment.patient_phone,
        "notes": appointment.notes,
        "date": appointment.date,
        "start_time": appointment.start_time.format(STORAGE_FORMAT).to_string(),
        "end_time": appointment.end_time.format(STORAGE_FORMAT).to_string(),
        "status": appointment.status,
        "cancellation_reason": appointment.cancellation_reason
    })
}

fn filter_query(filter: &AppointmentFilter) -> String {
    let mut query = vec![];

    if let Some(doctor_id) = filter.doctor_id {
        query.push(format!("doctor_id=eq.{}", doctor_id));
    }
    if let Some(status) = filter.status {
        query.push(format!("status=eq.{}", status));
    }
    if let Some(start) = filter.start_date {
        query.push(format!("date=gte.{}", start));
    }
    if let Some(end) = filter.end_date {
        query.push(format!("date=lte.{}", end));
    }
    query.push("order=date.asc,start_time.asc".to_string());
    query.push(format!("limit={}", filter.limit()));
    query.push(format!("offset={}", filter.offset()));

    query.join("&")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?{}", APPOINTMENTS, filter_query(filter));
        self.fetch(&path).await
    }

    async fn find_active(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=eq.{}&status=in.(pending,confirmed)&order=start_time.asc",
            APPOINTMENTS, doctor_id, date
        );
        self.fetch(&path).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);
        // created_at and updated_at come from the column defaults
        self.write(Method::POST, APPOINTMENTS, appointment_row(&appointment))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Storage("Insert returned no rows".to_string()))
    }

    async fn update(
        &self,
        expected: AppointmentStatus,
        appointment: &Appointment,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            APPOINTMENTS, appointment.id, expected
        );
        let body = json!({
            "date": appointment.date,
            "start_time": appointment.start_time.format(STORAGE_FORMAT).to_string(),
            "end_time": appointment.end_time.format(STORAGE_FORMAT).to_string(),
            "status": appointment.status,
            "cancellation_reason": appointment.cancellation_reason,
            "updated_at": appointment.updated_at.to_rfc3339()
        });

        if let Some(updated) = self.write(Method::PATCH, &path, body).await?.into_iter().next() {
            return Ok(updated);
        }

        // No row matched: either it is gone or its status moved on
        match self.get(appointment.id).await? {
            Some(current) => {
                warn!(
                    "Appointment {} is {} but was read as {}",
                    appointment.id, current.status, expected
                );
                Err(AppointmentError::stale_write(current.status, expected, appointment.status))
            }
            None => Err(AppointmentError::NotFound("Appointment".to_string())),
        }
    }

    async fn pending_created_after(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!(
            "{}?status=eq.pending&order=created_at.desc&limit={}",
            APPOINTMENTS, limit
        );
        if let Some(since) = since {
            path.push_str(&format!("&created_at=gt.{}", urlencoding::encode(&since.to_rfc3339())));
        }
        self.fetch(&path).await
    }
}
