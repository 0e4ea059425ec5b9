pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/session", post(handlers::handle_create_session))
        .route("/session/:id", get(handlers::handle_get_session))
        .route("/session/:id/assets", post(handlers::handle_attach_assets))
        .route(
            "/session/:id/settings",
            post(handlers::handle_apply_settings),
        )
        .route("/session/:id/start", post(handlers::handle_start))
        .route("/session/:id/message", post(handlers::handle_message))
        .route("/evaluate", post(handlers::handle_evaluate))
        .route("/extract", post(handlers::handle_extract))
        .with_state(state)
}
