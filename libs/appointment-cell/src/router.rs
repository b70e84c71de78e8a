// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{NotificationFeed, SchedulingService};

#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub scheduling: Arc<SchedulingService>,
    pub feed: Arc<NotificationFeed>,
}

pub fn appointment_routes(state: SchedulingState) -> Router {
    // Patient-facing booking flow
    let public_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/slots", get(handlers::get_merged_slots))
        .route("/slots/{doctor_id}", get(handlers::get_available_slots))
        .route("/available-doctors", get(handlers::get_available_doctors))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment));

    // Staff console
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/today", get(handlers::get_todays_appointments))
        .route("/notifications", get(handlers::get_notifications))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", patch(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
