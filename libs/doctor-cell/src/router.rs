use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::repository::{AvailabilityStore, DoctorDirectory};
use crate::services::{AvailabilityService, DoctorService};

#[derive(Clone)]
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<DoctorService>,
    pub availability: Arc<AvailabilityService>,
}

impl DoctorState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AvailabilityStore>,
        directory: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self {
            config,
            doctors: Arc::new(DoctorService::new(directory.clone())),
            availability: Arc::new(AvailabilityService::new(store, directory)),
        }
    }
}

pub fn doctor_routes(state: DoctorState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/status", patch(handlers::update_doctor_status))

        // Weekly hours; deleting deactivates
        .route("/{doctor_id}/availability", post(handlers::create_availability))
        .route("/{doctor_id}/availability/all", get(handlers::list_all_availability))
        .route("/{doctor_id}/availability/{rule_id}", put(handlers::update_availability))
        .route("/{doctor_id}/availability/{rule_id}", delete(handlers::delete_availability))
        .route("/{doctor_id}/availability/{rule_id}/activate", patch(handlers::activate_availability))

        // Dated leaves
        .route("/{doctor_id}/leaves", get(handlers::list_leaves).post(handlers::create_leave))
        .route("/{doctor_id}/leaves/{leave_id}", delete(handlers::delete_leave))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
