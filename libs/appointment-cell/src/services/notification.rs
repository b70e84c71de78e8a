use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, NotificationPage};
use crate::repository::AppointmentStore;

const CHANNEL_CAPACITY: usize = 256;

/// How far behind the newest seen booking the poller looks again. Covers
/// bookings stamped earlier that committed later.
const CURSOR_OVERLAP_SECS: i64 = 5;

/// Poller position: the newest `created_at` published so far plus the ids
/// published inside the overlap window.
struct FeedCursor {
    started: DateTime<Utc>,
    newest: DateTime<Utc>,
    seen: HashMap<Uuid, DateTime<Utc>>,
}

impl FeedCursor {
    fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            started: at,
            newest: at,
            seen: HashMap::new(),
        }
    }

    fn query_from(&self) -> DateTime<Utc> {
        self.newest - chrono::Duration::seconds(CURSOR_OVERLAP_SECS)
    }

    /// Takes a newest-first page and returns the unpublished items oldest first.
    fn admit(&mut self, page: Vec<Appointment>) -> Vec<Appointment> {
        let mut fresh: Vec<Appointment> = page
            .into_iter()
            .filter(|a| a.created_at > self.started && !self.seen.contains_key(&a.id))
            .collect();
        fresh.reverse();

        for appointment in &fresh {
            self.seen.insert(appointment.id, appointment.created_at);
            self.newest = self.newest.max(appointment.created_at);
        }

        let floor = self.query_from();
        self.seen.retain(|_, created_at| *created_at > floor);
        fresh
    }
}

/// Read-only feed of freshly booked, still pending appointments for staff.
pub struct NotificationFeed {
    store: Arc<dyn AppointmentStore>,
    page_size: usize,
    sender: broadcast::Sender<Appointment>,
}

impl NotificationFeed {
    pub fn new(store: Arc<dyn AppointmentStore>, page_size: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            store,
            page_size: page_size.max(1),
            sender,
        }
    }

    /// Pending appointments created after `since`, newest first.
    pub async fn poll(&self, since: Option<DateTime<Utc>>) -> Result<NotificationPage, AppointmentError> {
        let items = self.store.pending_created_after(since, self.page_size).await?;
        let next_cursor = items.first().map(|a| a.created_at).or(since);

        debug!("Notification poll since {:?} returned {} items", since, items.len());
        Ok(NotificationPage { items, next_cursor })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Appointment> {
        self.sender.subscribe()
    }

    /// Polls on a fixed interval and publishes new bookings until `shutdown`
    /// flips to true. Bookings older than the task's start are not replayed.
    pub fn spawn_poller(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut cursor = FeedCursor::starting_at(Utc::now());
            let mut interval = tokio::time::interval(every);
            info!("Notification poller started (every {:?})", every);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.poll(Some(cursor.query_from())).await {
                            Ok(page) => {
                                for appointment in cursor.admit(page.items) {
                                    info!(
                                        "New booking {} with doctor {} on {} at {}",
                                        appointment.id, appointment.doctor_id,
                                        appointment.date, appointment.start_time
                                    );
                                    // No subscribers is fine
                                    let _ = self.sender.send(appointment);
                                }
                            }
                            Err(e) => error!("Notification poll failed: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Notification poller stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
