use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentStatus};

use super::AppointmentStore;

#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clashes(existing: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
    candidate.is_active()
        && existing.values().any(|a| {
            a.id != candidate.id
                && a.is_active()
                && a.overlaps(candidate.doctor_id, candidate.date, candidate.start_time, candidate.end_time)
        })
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.date, a.start_time, a.created_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.limit())
            .collect())
    }

    async fn find_active(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let mut active: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date && a.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|a| a.start_time);
        Ok(active)
    }

    async fn insert(&self, mut appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        if clashes(&appointments, &appointment) {
            return Err(AppointmentError::SlotConflict);
        }
        // Stamped under the write lock so creation order matches commit order
        appointment.created_at = Utc::now();
        appointment.updated_at = appointment.created_at;
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(
        &self,
        expected: AppointmentStatus,
        appointment: &Appointment,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let current = appointments
            .get(&appointment.id)
            .map(|a| a.status)
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;
        if current != expected {
            return Err(AppointmentError::stale_write(current, expected, appointment.status));
        }
        if clashes(&appointments, appointment) {
            return Err(AppointmentError::SlotConflict);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn pending_created_after(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let mut fresh: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.status == AppointmentStatus::Pending)
            .filter(|a| since.map_or(true, |s| a.created_at > s))
            .cloned()
            .collect();
        fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        fresh.truncate(limit);
        Ok(fresh)
    }
}
