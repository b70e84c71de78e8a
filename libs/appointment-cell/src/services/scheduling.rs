use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::{DaySchedule, Doctor, Slot};
use doctor_cell::repository::{AvailabilityStore, DoctorDirectory};
use doctor_cell::services::SlotGenerator;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, AvailableDoctor,
    BookAppointmentRequest, PatientInfo,
};
use crate::repository::AppointmentStore;
use crate::services::clock::{Clock, SystemClock};
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycle;

/// Entry point for booking, lifecycle changes and slot queries.
///
/// Role checks happen at the HTTP edge; nothing here knows who is calling.
pub struct SchedulingService {
    slots: SlotGenerator,
    directory: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    ledger: BookingLedger,
    clock: Arc<dyn Clock>,
    booking_timeout: Duration,
    email_pattern: Regex,
    phone_pattern: Regex,
}

impl SchedulingService {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        booking_timeout: Duration,
    ) -> Result<Self, AppointmentError> {
        let email_pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        let phone_pattern = Regex::new(r"^\+?[0-9][0-9\s\-()]{5,19}$")
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;

        Ok(Self {
            slots: SlotGenerator::new(availability),
            directory,
            ledger: BookingLedger::new(store.clone()),
            store,
            clock: Arc::new(SystemClock),
            booking_timeout,
            email_pattern,
            phone_pattern,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ==============================================================================
    // SLOT QUERIES
    // ==============================================================================

    /// Free, not-yet-started slots for a doctor on a date, plus the reasons
    /// a day may be empty. Never fails for a known doctor.
    pub async fn day_availability(&self, doctor_id: Uuid, date: NaiveDate) -> Result<DaySchedule, AppointmentError> {
        let doctor = self.require_doctor(doctor_id).await?;
        self.schedule_for(&doctor, date).await
    }

    /// Like `day_availability`, but a day with no working hours is `NotFound`.
    pub async fn list_available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let schedule = self.day_availability(doctor_id, date).await?;
        if !schedule.has_rules_for_day {
            return Err(AppointmentError::NotFound(format!("Availability on {}", date)));
        }
        Ok(schedule.slots)
    }

    /// Active doctors with a free slot starting exactly at `time`.
    pub async fn available_doctors_at(&self, date: NaiveDate, time: NaiveTime) -> Result<Vec<AvailableDoctor>, AppointmentError> {
        let mut available = Vec::new();

        for doctor in self.directory.list_active_doctors().await? {
            let schedule = self.schedule_for(&doctor, date).await?;
            if let Some(slot) = schedule.slots.into_iter().find(|s| s.start_time == time) {
                available.push(AvailableDoctor { doctor, slot });
            }
        }

        debug!("{} doctors free on {} at {}", available.len(), date, time);
        Ok(available)
    }

    /// Sorted, de-duplicated free start times across every active doctor.
    pub async fn merged_slot_times(&self, date: NaiveDate) -> Result<Vec<NaiveTime>, AppointmentError> {
        let mut times = BTreeSet::new();

        for doctor in self.directory.list_active_doctors().await? {
            let schedule = self.schedule_for(&doctor, date).await?;
            times.extend(schedule.slots.iter().map(|s| s.start_time));
        }

        Ok(times.into_iter().collect())
    }

    async fn schedule_for(&self, doctor: &Doctor, date: NaiveDate) -> Result<DaySchedule, AppointmentError> {
        if !doctor.is_active {
            return Ok(DaySchedule {
                doctor_id: doctor.id,
                date,
                has_rules_for_day: false,
                on_leave: false,
                slots: Vec::new(),
            });
        }

        let mut schedule = self.slots.day_schedule(doctor.id, date).await?;
        if schedule.slots.is_empty() {
            return Ok(schedule);
        }

        let booked = self.ledger.find_active(doctor.id, date).await?;
        let now = self.clock.now();

        for slot in schedule.slots.iter_mut() {
            let taken = booked
                .iter()
                .any(|a| a.overlaps(doctor.id, date, slot.start_time, slot.end_time));
            let started = date < now.date() || (date == now.date() && slot.start_time <= now.time());
            slot.is_available = !taken && !started;
        }
        schedule.slots.retain(|s| s.is_available);

        Ok(schedule)
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, date = %request.date, start = %request.start_time))]
    pub async fn book_appointment(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let patient = self.validate_patient(request.patient)?;
        let slot = self
            .bookable_slot(request.doctor_id, request.date, request.start_time)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_name: patient.patient_name,
            patient_email: patient.patient_email,
            patient_phone: patient.patient_phone,
            notes: patient.notes,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: AppointmentStatus::Pending,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let booked = self.ledger.reserve(appointment, self.booking_timeout).await?;

        info!("Booked appointment {} for {}", booked.id, booked.patient_name);
        Ok(booked)
    }

    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(id).await?;
        if !appointment.is_active() {
            warn!("Refusing to reschedule appointment {} in status {}", id, appointment.status);
            return Err(AppointmentError::InvalidStateTransition {
                from: appointment.status,
                action: "reschedule",
            });
        }

        let slot = self.bookable_slot(appointment.doctor_id, date, start_time).await?;

        self.ledger
            .move_to(appointment, slot.date, slot.start_time, slot.end_time, self.booking_timeout)
            .await
    }

    /// Checks a requested start against the doctor's state, leaves, the
    /// clock and the generated slot boundaries.
    async fn bookable_slot(&self, doctor_id: Uuid, date: NaiveDate, start_time: NaiveTime) -> Result<Slot, AppointmentError> {
        let now = self.clock.now();
        if date < now.date() {
            return Err(AppointmentError::Validation(format!("{} is in the past", date)));
        }

        let doctor = self.require_doctor(doctor_id).await?;
        if !doctor.is_active {
            return Err(AppointmentError::Validation(
                "Doctor is not accepting appointments".to_string(),
            ));
        }

        let schedule = self.slots.day_schedule(doctor_id, date).await?;
        if schedule.on_leave {
            return Err(AppointmentError::Validation(format!("Doctor is on leave on {}", date)));
        }

        let slot = schedule
            .slots
            .into_iter()
            .find(|s| s.start_time == start_time)
            .ok_or_else(|| {
                AppointmentError::Validation(format!(
                    "{} is not a slot start for this doctor on {}",
                    start_time.format("%H:%M"),
                    date
                ))
            })?;

        if date == now.date() && slot.start_time <= now.time() {
            return Err(AppointmentError::Validation("Slot has already started".to_string()));
        }

        Ok(slot)
    }

    fn validate_patient(&self, patient: PatientInfo) -> Result<PatientInfo, AppointmentError> {
        let name = patient.patient_name.trim().to_string();
        if name.is_empty() {
            return Err(AppointmentError::Validation("Patient name is required".to_string()));
        }

        let email = patient.patient_email.trim().to_string();
        if !self.email_pattern.is_match(&email) {
            return Err(AppointmentError::Validation("Patient email is invalid".to_string()));
        }

        let phone = patient.patient_phone.trim().to_string();
        if !self.phone_pattern.is_match(&phone) {
            return Err(AppointmentError::Validation("Patient phone is invalid".to_string()));
        }

        Ok(PatientInfo {
            patient_name: name,
            patient_email: email,
            patient_phone: phone,
            notes: patient.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        })
    }

    // ==============================================================================
    // LIFECYCLE
    // ==============================================================================

    /// Idempotent on an already cancelled appointment.
    pub async fn cancel_appointment(&self, id: Uuid, reason: Option<String>) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(id).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} already cancelled", id);
            return Ok(appointment);
        }

        AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        match self.ledger.release(appointment, reason).await {
            // Lost a race with another cancel
            Err(AppointmentError::InvalidStateTransition { from: AppointmentStatus::Cancelled, .. }) => {
                self.get_appointment(id).await
            }
            other => other,
        }
    }

    pub async fn confirm_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(id, AppointmentStatus::Confirmed).await
    }

    pub async fn complete_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(id, AppointmentStatus::Completed).await
    }

    async fn transition(&self, id: Uuid, next: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(id).await?;
        AppointmentLifecycle::validate_transition(appointment.status, next)?;

        let updated = self.ledger.set_status(appointment, next).await?;
        info!("Appointment {} moved to {}", id, next);
        Ok(updated)
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))
    }

    pub async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(AppointmentError::Validation(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        self.store.list(filter).await
    }

    /// All confirmed appointments for today, by start time.
    pub async fn todays_appointments(&self) -> Result<Vec<Appointment>, AppointmentError> {
        let today = self.clock.now().date();
        let mut filter = AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            start_date: Some(today),
            end_date: Some(today),
            limit: Some(AppointmentFilter::MAX_LIMIT),
            offset: Some(0),
            ..Default::default()
        };

        let mut appointments = Vec::new();
        loop {
            let page = self.store.list(&filter).await?;
            let full = page.len() == filter.limit();
            appointments.extend(page);
            if !full {
                break;
            }
            filter.offset = Some(appointments.len());
        }
        appointments.sort_by_key(|a| (a.start_time, a.doctor_id));
        Ok(appointments)
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))
    }
}
