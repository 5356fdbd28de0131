//! HTTP API and WebSocket relay channel
//!
//! - GET /ws - Open a relay session (WebSocket)
//! - GET /sessions - Stats for all live sessions
//! - GET /sessions/:id/status - Stats for one session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;
mod websocket;

pub use routes::create_router;
pub use state::AppState;
