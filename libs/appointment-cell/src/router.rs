// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment).delete(handlers::delete_appointment))
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        // Manual recovery when the completion hook did not run
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn roster_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/patients", get(handlers::search_patients))
        .route("/professionals", get(handlers::list_professionals))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
