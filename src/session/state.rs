use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::stats::SessionStats;
use crate::error::{RelayError, Result};
use crate::latch::Latch;

/// Source/target language pair of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// The pair for the other speaker
    pub fn swapped(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

/// Where the session's current pipeline cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PipelineStage {
    Idle = 0,
    Transcribing = 1,
    Translating = 2,
    Synthesizing = 3,
    Delivering = 4,
    Failed = 5,
}

impl PipelineStage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineStage::Transcribing,
            2 => PipelineStage::Translating,
            3 => PipelineStage::Synthesizing,
            4 => PipelineStage::Delivering,
            5 => PipelineStage::Failed,
            _ => PipelineStage::Idle,
        }
    }
}

/// Last transcript/translation shown for this session
#[derive(Debug, Clone, Default)]
struct TextState {
    utterance_id: Option<String>,
    transcript: String,
    translation: String,
}

/// Per-connection state, owned by one session and never shared across sessions.
pub struct SessionState {
    session_id: String,
    started_at: DateTime<Utc>,
    languages: RwLock<LanguagePair>,
    text: RwLock<TextState>,

    /// Single-flight guard: set while a cycle is in flight
    processing: Latch,
    /// Set once the current cycle's result has been finalized for delivery
    finalized: Latch,
    stage: AtomicU8,

    utterances_processed: AtomicUsize,
    busy_rejections: AtomicUsize,
    failed_cycles: AtomicUsize,
    transfers_delivered: AtomicUsize,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, languages: LanguagePair) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            languages: RwLock::new(languages),
            text: RwLock::new(TextState::default()),
            processing: Latch::new(),
            finalized: Latch::new(),
            stage: AtomicU8::new(PipelineStage::Idle as u8),
            utterances_processed: AtomicUsize::new(0),
            busy_rejections: AtomicUsize::new(0),
            failed_cycles: AtomicUsize::new(0),
            transfers_delivered: AtomicUsize::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn languages(&self) -> LanguagePair {
        self.languages.read().await.clone()
    }

    pub async fn set_languages(&self, languages: LanguagePair) {
        info!(
            "Session {} languages: {} -> {}",
            self.session_id, languages.source, languages.target
        );
        *self.languages.write().await = languages;
    }

    // ------------------------------------------------------------------
    // Single-flight guard
    // ------------------------------------------------------------------

    /// Mark the session busy. `false` means a cycle is already in flight.
    pub fn try_begin_processing(&self) -> bool {
        self.processing.try_set()
    }

    /// Clear the busy flag and return to `Idle`.
    pub fn end_processing(&self) {
        self.set_stage(PipelineStage::Idle);
        self.processing.reset();
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_set()
    }

    /// Take the single-flight guard, or fail with `Busy`.
    ///
    /// The guard calls `end_processing()` when dropped, so every exit path
    /// of a cycle releases it.
    pub fn acquire(self: &Arc<Self>) -> Result<ProcessingGuard> {
        if self.try_begin_processing() {
            debug!("Session {} acquired processing guard", self.session_id);
            Ok(ProcessingGuard {
                state: Arc::clone(self),
            })
        } else {
            self.busy_rejections.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::Busy)
        }
    }

    // ------------------------------------------------------------------
    // Finalize latch
    // ------------------------------------------------------------------

    /// Start a new result cycle: re-arm the finalize latch.
    pub fn begin_result_cycle(&self) {
        self.finalized.reset();
    }

    /// Claim the right to deliver the current result. `true` exactly once per cycle.
    pub fn try_finalize(&self) -> bool {
        self.finalized.try_set()
    }

    // ------------------------------------------------------------------
    // Stage and text
    // ------------------------------------------------------------------

    pub fn stage(&self) -> PipelineStage {
        PipelineStage::from_u8(self.stage.load(Ordering::SeqCst))
    }

    pub fn set_stage(&self, stage: PipelineStage) {
        let previous = PipelineStage::from_u8(self.stage.swap(stage as u8, Ordering::SeqCst));
        if previous != stage {
            debug!("Session {} stage {:?} -> {:?}", self.session_id, previous, stage);
        }
    }

    pub async fn record_transcript(&self, utterance_id: &str, transcript: &str) {
        let mut text = self.text.write().await;
        text.utterance_id = Some(utterance_id.to_string());
        text.transcript = transcript.to_string();
        text.translation.clear();
    }

    pub async fn record_translation(&self, translation: &str) {
        self.text.write().await.translation = translation.to_string();
    }

    pub fn record_utterance(&self) {
        self.utterances_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed_cycles.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_delivery(&self) {
        self.transfers_delivered.fetch_add(1, Ordering::SeqCst);
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let languages = self.languages().await;
        let text = self.text.read().await.clone();

        SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            stage: self.stage(),
            is_processing: self.is_processing(),
            source_language: languages.source,
            target_language: languages.target,
            utterances_processed: self.utterances_processed.load(Ordering::SeqCst),
            busy_rejections: self.busy_rejections.load(Ordering::SeqCst),
            failed_cycles: self.failed_cycles.load(Ordering::SeqCst),
            transfers_delivered: self.transfers_delivered.load(Ordering::SeqCst),
            last_utterance_id: text.utterance_id,
            transcript: text.transcript,
            translation: text.translation,
        }
    }
}

/// Held for the lifetime of one pipeline cycle
pub struct ProcessingGuard {
    state: Arc<SessionState>,
}

impl ProcessingGuard {
    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.state.end_processing();
        debug!("Session {} released processing guard", self.state.session_id);
    }
}
