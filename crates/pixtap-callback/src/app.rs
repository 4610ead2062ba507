//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::handlers;
use crate::state::ServerState;

/// Create the callback router: every path serves assets on GET and helper
/// calls on POST.
pub(crate) fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            "/{*path}",
            get(handlers::get_asset).post(handlers::call_helper),
        )
        .with_state(state)
}
