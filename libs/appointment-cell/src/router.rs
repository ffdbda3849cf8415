// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    // Every appointment operation requires authentication
    let protected_routes = Router::new()
        .route("/patient", post(handlers::book_appointment).get(handlers::get_patient_appointments))
        .route("/patient/status/{status}", get(handlers::get_patient_appointments_by_status))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/doctor/status/{status}", get(handlers::get_doctor_appointments_by_status))
        .route("/{appointment_id}", get(handlers::get_appointment).put(handlers::update_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/approve", patch(handlers::approve_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
