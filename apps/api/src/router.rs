use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tracing::{info, warn};

use appointment_cell::repository::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use appointment_cell::router::{appointment_routes, SchedulingState};
use appointment_cell::services::{NotificationFeed, SchedulingService};
use doctor_cell::repository::{AvailabilityStore, DoctorDirectory, InMemoryDoctorStore, SupabaseDoctorStore};
use doctor_cell::router::{doctor_routes, DoctorState};
use shared_config::{AppConfig, StorageBackend};

pub struct Application {
    pub router: Router,
    pub feed: Arc<NotificationFeed>,
}

struct Stores {
    availability: Arc<dyn AvailabilityStore>,
    directory: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentStore>,
}

fn build_stores(config: &AppConfig) -> Stores {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            let doctors = InMemoryDoctorStore::new();
            Stores {
                availability: Arc::new(doctors.clone()),
                directory: Arc::new(doctors),
                appointments: Arc::new(InMemoryAppointmentStore::new()),
            }
        }
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            Stores {
                availability: Arc::new(SupabaseDoctorStore::new(config)),
                directory: Arc::new(SupabaseDoctorStore::new(config)),
                appointments: Arc::new(SupabaseAppointmentStore::new(config)),
            }
        }
    }
}

pub fn create_router(config: Arc<AppConfig>) -> Result<Application> {
    let stores = build_stores(&config);

    let scheduling = SchedulingService::new(
        stores.availability.clone(),
        stores.directory.clone(),
        stores.appointments.clone(),
        config.booking_timeout(),
    )?;
    let feed = Arc::new(NotificationFeed::new(
        stores.appointments.clone(),
        config.notification_page_size,
    ));

    let doctor_state = DoctorState::new(config.clone(), stores.availability, stores.directory);
    let scheduling_state = SchedulingState {
        config: config.clone(),
        scheduling: Arc::new(scheduling),
        feed: feed.clone(),
    };

    let router = Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(scheduling_state));

    Ok(Application { router, feed })
}
