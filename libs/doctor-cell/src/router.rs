// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Mounted under `/patients/available-doctors`; any authenticated caller.
pub fn availability_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::get_available_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
