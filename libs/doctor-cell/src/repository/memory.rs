use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AvailabilityRule, Doctor, DoctorError, DoctorLeave};

use super::{AvailabilityStore, DoctorDirectory};

#[derive(Default)]
struct DoctorData {
    doctors: HashMap<Uuid, Doctor>,
    rules: HashMap<Uuid, AvailabilityRule>,
    leaves: HashMap<Uuid, DoctorLeave>,
}

/// Process-local store. Cloning shares the same underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryDoctorStore {
    data: Arc<RwLock<DoctorData>>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryDoctorStore {
    async fn rules_for_doctor(
        &self,
        doctor_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let data = self.data.read().await;
        let mut rules: Vec<AvailabilityRule> = data
            .rules
            .values()
            .filter(|r| r.doctor_id == doctor_id && (include_inactive || r.is_active))
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.day_of_week, r.start_time, r.created_at));
        Ok(rules)
    }

    async fn active_rules_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let data = self.data.read().await;
        let mut rules: Vec<AvailabilityRule> = data
            .rules
            .values()
            .filter(|r| r.doctor_id == doctor_id && r.day_of_week == day_of_week && r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.start_time);
        Ok(rules)
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        Ok(self.data.read().await.rules.get(&rule_id).cloned())
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        self.data.write().await.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<AvailabilityRule>, DoctorError> {
        let mut data = self.data.write().await;
        Ok(data.rules.get_mut(&rule_id).map(|rule| {
            rule.is_active = is_active;
            rule.updated_at = Utc::now();
            rule.clone()
        }))
    }

    async fn leaves_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorLeave>, DoctorError> {
        let data = self.data.read().await;
        let mut leaves: Vec<DoctorLeave> = data
            .leaves
            .values()
            .filter(|l| l.doctor_id == doctor_id)
            .cloned()
            .collect();
        leaves.sort_by_key(|l| l.start_date);
        Ok(leaves)
    }

    async fn leave_covering(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorLeave>, DoctorError> {
        let data = self.data.read().await;
        Ok(data
            .leaves
            .values()
            .find(|l| l.doctor_id == doctor_id && l.covers(date))
            .cloned())
    }

    async fn insert_leave(&self, leave: DoctorLeave) -> Result<DoctorLeave, DoctorError> {
        self.data.write().await.leaves.insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn delete_leave(&self, doctor_id: Uuid, leave_id: Uuid) -> Result<bool, DoctorError> {
        let mut data = self.data.write().await;
        match data.leaves.get(&leave_id) {
            Some(leave) if leave.doctor_id == doctor_id => {
                data.leaves.remove(&leave_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.data.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn list_active_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        let data = self.data.read().await;
        let mut doctors: Vec<Doctor> = data.doctors.values().filter(|d| d.is_active).cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        self.data.write().await.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn set_doctor_active(
        &self,
        doctor_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Doctor>, DoctorError> {
        let mut data = self.data.write().await;
        Ok(data.doctors.get_mut(&doctor_id).map(|doctor| {
            doctor.is_active = is_active;
            doctor.clone()
        }))
    }
}
