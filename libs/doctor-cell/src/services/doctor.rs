use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError};
use crate::repository::DoctorDirectory;

/// Thin facade over the doctor directory.
pub struct DoctorService {
    directory: Arc<dyn DoctorDirectory>,
}

impl DoctorService {
    pub fn new(directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { directory }
    }

    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DoctorError::Validation("Doctor name is required".to_string()));
        }

        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialization: request
                .specialization
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            is_active: true,
        };

        let doctor = self.directory.insert_doctor(doctor).await?;
        info!("Registered doctor {} ({})", doctor.id, doctor.name);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| DoctorError::NotFound("Doctor".to_string()))
    }

    pub async fn set_active(&self, doctor_id: Uuid, is_active: bool) -> Result<Doctor, DoctorError> {
        let doctor = self
            .directory
            .set_doctor_active(doctor_id, is_active)
            .await?
            .ok_or_else(|| DoctorError::NotFound("Doctor".to_string()))?;
        info!("Doctor {} is now {}", doctor_id, if is_active { "active" } else { "inactive" });
        Ok(doctor)
    }

    pub async fn list_active(&self) -> Result<Vec<Doctor>, DoctorError> {
        self.directory.list_active_doctors().await
    }
}
