pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::*;
pub use repository::{AvailabilityStore, DoctorDirectory, InMemoryDoctorStore, SupabaseDoctorStore};
pub use router::{doctor_routes, DoctorState};
pub use services::{generate_slots, AvailabilityService, DoctorService, SlotGenerator};
