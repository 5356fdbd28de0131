use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::PipelineStage;

/// Statistics about a relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the connection was opened
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Whether a cycle currently holds the single-flight guard
    pub is_processing: bool,

    pub source_language: String,
    pub target_language: String,

    /// Utterances accepted for processing
    pub utterances_processed: usize,

    /// Work shed because a cycle was in flight
    pub busy_rejections: usize,

    pub failed_cycles: usize,

    /// Synthesized-speech transfers sent to the client
    pub transfers_delivered: usize,

    pub last_utterance_id: Option<String>,
    pub transcript: String,
    pub translation: String,
}
