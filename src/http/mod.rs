//! HTTP API server for the host UI
//!
//! This module exposes one interview session to a local front end:
//! - GET /session - Current session view
//! - POST /session/start - Ask the backend to start the interview
//! - PUT /session/answer - Replace the typed answer
//! - POST /session/submit - Submit the current answer
//! - POST /session/recording/start - Start recording the answer
//! - POST /session/recording/stop - Stop recording and transcribe
//! - POST /session/leave - Leave the room
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
