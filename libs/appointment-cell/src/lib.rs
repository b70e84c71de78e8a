pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::*;
pub use repository::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
pub use router::{appointment_routes, SchedulingState};
pub use services::{BookingLedger, NotificationFeed, SchedulingService};
