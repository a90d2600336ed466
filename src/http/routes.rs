use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session view
        .route("/session", get(handlers::get_session))
        // Interview control
        .route("/session/start", post(handlers::start_interview))
        .route("/session/answer", put(handlers::update_answer))
        .route("/session/submit", post(handlers::submit_answer))
        .route("/session/leave", post(handlers::leave_room))
        // Recording control
        .route("/session/recording/start", post(handlers::start_recording))
        .route("/session/recording/stop", post(handlers::stop_recording))
        // The host UI is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
