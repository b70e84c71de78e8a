use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::repository::AppointmentStore;

type SlotKey = (Uuid, NaiveDate);

const LOCK_TABLE_PRUNE_AT: usize = 1024;

/// Authoritative record of who holds which interval.
///
/// Writes that can take a slot (`reserve`, `move_to`) are serialized per
/// `(doctor_id, date)`: the overlap check and the write run under the same
/// lock, so two requests for one slot cannot both pass the check.
///
/// The caller's budget bounds waiting for the lock and the overlap check.
/// A write that has been sent is always awaited, so `Timeout` means nothing
/// was written.
pub struct BookingLedger {
    store: Arc<dyn AppointmentStore>,
    locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, doctor_id: Uuid, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() >= LOCK_TABLE_PRUNE_AT {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry((doctor_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn find_active(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.find_active(doctor_id, date).await
    }

    /// Half-open test against active appointments; touching intervals are fine.
    pub async fn overlaps(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        ignore: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let active = self.store.find_active(doctor_id, date).await?;
        Ok(active
            .iter()
            .filter(|a| Some(a.id) != ignore)
            .any(|a| a.overlaps(doctor_id, date, start, end)))
    }

    pub async fn reserve(&self, appointment: Appointment, budget: Duration) -> Result<Appointment, AppointmentError> {
        let _guard = self
            .claim(
                appointment.doctor_id,
                appointment.date,
                appointment.start_time,
                appointment.end_time,
                None,
                budget,
            )
            .await?;

        let stored = self.store.insert(appointment).await?;
        info!(
            "Reserved {} {}-{} for doctor {} as appointment {}",
            stored.date, stored.start_time, stored.end_time, stored.doctor_id, stored.id
        );
        Ok(stored)
    }

    /// Takes the `(doctor, date)` lock and checks the interval is free, both
    /// within `budget`. The returned guard keeps the lock for the write.
    async fn claim(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        ignore: Option<Uuid>,
        budget: Duration,
    ) -> Result<OwnedMutexGuard<()>, AppointmentError> {
        let claimed = timeout(budget, async {
            let guard = self.lock_for(doctor_id, date).await.lock_owned().await;
            if self.overlaps(doctor_id, date, start, end, ignore).await? {
                warn!("Slot {} {} for doctor {} already taken", date, start, doctor_id);
                return Err(AppointmentError::SlotConflict);
            }
            Ok::<_, AppointmentError>(guard)
        })
        .await;

        match claimed {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Could not claim {} {} for doctor {} within {:?}",
                    date, start, doctor_id, budget
                );
                Err(AppointmentError::Timeout)
            }
        }
    }

    /// Cancels an appointment, freeing its interval.
    pub async fn release(&self, mut appointment: Appointment, reason: Option<String>) -> Result<Appointment, AppointmentError> {
        let expected = appointment.status;
        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = reason;
        appointment.updated_at = Utc::now();

        let stored = self.store.update(expected, &appointment).await?;
        info!("Released slot of appointment {}", stored.id);
        Ok(stored)
    }

    /// Only applies while the stored status still matches `appointment.status`.
    pub async fn set_status(&self, mut appointment: Appointment, status: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        let expected = appointment.status;
        appointment.status = status;
        appointment.updated_at = Utc::now();
        let stored = self.store.update(expected, &appointment).await?;
        debug!("Appointment {} is now {}", stored.id, stored.status);
        Ok(stored)
    }

    /// Moves an active appointment to a new interval, ignoring its own current one.
    /// Fails with `InvalidStateTransition` if its status changed since it was read.
    pub async fn move_to(
        &self,
        mut appointment: Appointment,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        budget: Duration,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self
            .claim(appointment.doctor_id, date, start, end, Some(appointment.id), budget)
            .await?;

        appointment.date = date;
        appointment.start_time = start;
        appointment.end_time = end;
        appointment.updated_at = Utc::now();

        let stored = self.store.update(appointment.status, &appointment).await?;
        info!("Moved appointment {} to {} {}", stored.id, stored.date, stored.start_time);
        Ok(stored)
    }
}
