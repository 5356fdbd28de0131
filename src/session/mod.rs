//! Relay session management
//!
//! One `RelaySession` per connection:
//! - Language pair and pipeline stage (`SessionState`)
//! - Single-flight guard and finalize latch
//! - Reassembly of uploaded utterances
//! - Registry of live sessions keyed by connection ID

mod registry;
mod session;
mod state;
mod stats;

pub use registry::SessionRegistry;
pub use session::RelaySession;
pub use state::{LanguagePair, PipelineStage, ProcessingGuard, SessionState};
pub use stats::SessionStats;
