#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use appointment_cell::models::{BookAppointmentRequest, PatientInfo};
use appointment_cell::repository::InMemoryAppointmentStore;
use appointment_cell::services::{FixedClock, SchedulingService};
use doctor_cell::models::{AvailabilityRule, Doctor, RuleWindow};
use doctor_cell::repository::{AvailabilityStore, DoctorDirectory, InMemoryDoctorStore};

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2030-01-07, a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

/// The Friday before `monday()`.
pub fn friday_before() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 4).unwrap().and_hms_opt(8, 0, 0).unwrap()
}

pub struct Clinic {
    pub doctors: InMemoryDoctorStore,
    pub appointments: InMemoryAppointmentStore,
    pub scheduling: Arc<SchedulingService>,
}

impl Clinic {
    pub async fn new() -> Self {
        Self::at(friday_before()).await
    }

    pub async fn at(now: NaiveDateTime) -> Self {
        let doctors = InMemoryDoctorStore::new();
        let appointments = InMemoryAppointmentStore::new();
        let scheduling = SchedulingService::new(
            Arc::new(doctors.clone()),
            Arc::new(doctors.clone()),
            Arc::new(appointments.clone()),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock(now)));

        Self {
            doctors,
            appointments,
            scheduling: Arc::new(scheduling),
        }
    }

    pub async fn add_doctor(&self, name: &str) -> Uuid {
        self.doctors
            .insert_doctor(Doctor {
                id: Uuid::new_v4(),
                name: name.to_string(),
                specialization: None,
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn add_rule(&self, doctor_id: Uuid, day_of_week: i32, start: NaiveTime, end: NaiveTime, duration: i32) {
        self.doctors
            .insert_rule(AvailabilityRule::new(
                doctor_id,
                RuleWindow {
                    day_of_week,
                    start_time: start,
                    end_time: end,
                    slot_duration: duration,
                },
            ))
            .await
            .unwrap();
    }
}

pub fn booking(doctor_id: Uuid, date: NaiveDate, start: NaiveTime, name: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        date,
        start_time: start,
        patient: PatientInfo {
            patient_name: name.to_string(),
            patient_email: format!("{}@example.com", name.to_lowercase()),
            patient_phone: "+977 9800000000".to_string(),
            notes: None,
        },
    }
}
