use std::sync::Arc;

use crate::config::RelayConfig;
use crate::pipeline::{Engines, PipelineOrchestrator};
use crate::session::SessionRegistry;

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    /// Live relay sessions (session_id → state)
    pub sessions: SessionRegistry,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub relay: RelayConfig,
}

impl AppState {
    pub fn new(engines: Engines, relay: RelayConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            orchestrator: Arc::new(PipelineOrchestrator::new(engines, &relay)),
            relay,
        }
    }
}
