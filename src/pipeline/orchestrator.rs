use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::engines::Engines;
use crate::audio::Utterance;
use crate::config::RelayConfig;
use crate::error::{EngineStage, RelayError, Result};
use crate::protocol::ServerMessage;
use crate::session::{LanguagePair, PipelineStage, ProcessingGuard, SessionState};
use crate::transfer::ChunkSender;

/// How a cycle that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Synthesized speech was streamed to the client
    Delivered { transfer_id: String, bytes: usize },
    /// Nothing was said; translate and synthesize were skipped
    EmptyTranscript,
    /// The translation came back empty; synthesis was skipped
    EmptyTranslation,
    /// The result had already been finalized for delivery this cycle
    AlreadyFinalized,
}

/// Drives transcribe → translate → synthesize → deliver for one session.
///
/// Every cycle runs under a `ProcessingGuard`; the guard is released on
/// every exit path, and failures are reported to the client as an `error`
/// event. Failed cycles are never retried here.
pub struct PipelineOrchestrator {
    engines: Engines,
    speech_sender: ChunkSender,
    min_payload_bytes: usize,
}

impl PipelineOrchestrator {
    pub fn new(engines: Engines, relay: &RelayConfig) -> Self {
        Self {
            engines,
            speech_sender: ChunkSender::new(relay.chunk_size, relay.min_payload_bytes)
                .with_delay(relay.chunk_delay()),
            min_payload_bytes: relay.min_payload_bytes,
        }
    }

    /// Validate an utterance, then take the session's single-flight guard.
    ///
    /// Undersized payloads are rejected before the guard is touched, so they
    /// never disturb an in-flight cycle.
    pub fn admit_utterance(&self, state: &Arc<SessionState>, utterance: &Utterance) -> Result<ProcessingGuard> {
        if utterance.byte_size() < self.min_payload_bytes {
            warn!(
                "Session {}: rejecting utterance {} ({} bytes < {})",
                state.session_id(),
                utterance.id,
                utterance.byte_size(),
                self.min_payload_bytes
            );
            return Err(RelayError::InputRejected {
                size: utterance.byte_size(),
                min: self.min_payload_bytes,
            });
        }

        self.admit(state)
    }

    /// Take the single-flight guard for a text-only request.
    pub fn admit(&self, state: &Arc<SessionState>) -> Result<ProcessingGuard> {
        state.acquire().inspect_err(|_| {
            warn!(
                "Session {}: busy in {:?}, shedding new work",
                state.session_id(),
                state.stage()
            );
        })
    }

    /// Full cycle for a recorded utterance.
    pub async fn process_utterance(
        &self,
        guard: ProcessingGuard,
        utterance: Utterance,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        let result = self.run_utterance(guard.state(), &utterance, out).await;
        self.conclude(guard, result, out).await
    }

    /// Translate already-known text, then speak it.
    pub async fn process_text(
        &self,
        guard: ProcessingGuard,
        text: String,
        languages: LanguagePair,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        let utterance_id = format!("text-{}", uuid::Uuid::new_v4());
        let state = Arc::clone(guard.state());
        state.begin_result_cycle();
        state.record_transcript(&utterance_id, text.trim()).await;

        let result = if text.trim().is_empty() {
            Ok(CycleOutcome::EmptyTranscript)
        } else {
            self.translate_and_speak(&state, &utterance_id, text.trim(), &languages, out)
                .await
        };
        self.conclude(guard, result, out).await
    }

    /// Synthesize and deliver text as-is.
    pub async fn process_speech(
        &self,
        guard: ProcessingGuard,
        text: String,
        language: String,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        let state = Arc::clone(guard.state());
        state.begin_result_cycle();

        let result = if text.trim().is_empty() {
            Ok(CycleOutcome::EmptyTranslation)
        } else {
            self.speak(&state, text.trim(), &language, out).await
        };
        self.conclude(guard, result, out).await
    }

    async fn run_utterance(
        &self,
        state: &SessionState,
        utterance: &Utterance,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        let languages = state.languages().await;
        state.begin_result_cycle();
        state.record_utterance();

        info!(
            "Session {}: transcribing {} ({} bytes, {}, ~{:?}, {} -> {})",
            state.session_id(),
            utterance.id,
            utterance.byte_size(),
            utterance.mime_type,
            utterance.duration,
            languages.source,
            languages.target
        );

        state.set_stage(PipelineStage::Transcribing);
        let transcript = self
            .engines
            .transcriber
            .transcribe(&utterance.audio, &utterance.mime_type, &languages.source)
            .await
            .map_err(|e| RelayError::engine(EngineStage::Transcription, e))?;
        let transcript = transcript.trim();

        state.record_transcript(&utterance.id, transcript).await;
        emit(
            out,
            ServerMessage::Transcription {
                utterance_id: utterance.id.clone(),
                text: transcript.to_string(),
                is_final: true,
            },
        )
        .await?;

        if transcript.is_empty() {
            info!("Session {}: empty transcript, nothing to translate", state.session_id());
            return Ok(CycleOutcome::EmptyTranscript);
        }

        self.translate_and_speak(state, &utterance.id, transcript, &languages, out)
            .await
    }

    async fn translate_and_speak(
        &self,
        state: &SessionState,
        utterance_id: &str,
        text: &str,
        languages: &LanguagePair,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        state.set_stage(PipelineStage::Translating);

        let (partial_tx, mut partial_rx) = mpsc::channel::<String>(16);
        let translate = self.engines.translator.translate_incremental(
            text,
            &languages.source,
            &languages.target,
            partial_tx,
        );
        // Dropping the receiver on a closed client makes further partials fail fast
        let forward = async move {
            while let Some(partial) = partial_rx.recv().await {
                let message = ServerMessage::TranslationStream {
                    utterance_id: utterance_id.to_string(),
                    translation: partial,
                    partial: true,
                };
                if out.send(message).await.is_err() {
                    debug!("Client gone, no longer forwarding partial translations");
                    break;
                }
            }
        };
        let (translation, ()) = tokio::join!(translate, forward);

        let translation = translation.map_err(|e| RelayError::engine(EngineStage::Translation, e))?;
        let translation = translation.trim();

        state.record_translation(translation).await;
        emit(
            out,
            ServerMessage::TranslationStream {
                utterance_id: utterance_id.to_string(),
                translation: translation.to_string(),
                partial: false,
            },
        )
        .await?;

        if translation.is_empty() {
            warn!("Session {}: empty translation, skipping synthesis", state.session_id());
            return Ok(CycleOutcome::EmptyTranslation);
        }

        self.speak(state, translation, &languages.target, out).await
    }

    async fn speak(
        &self,
        state: &SessionState,
        text: &str,
        language: &str,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        state.set_stage(PipelineStage::Synthesizing);
        let speech = self
            .engines
            .synthesizer
            .synthesize(text, language)
            .await
            .map_err(|e| RelayError::engine(EngineStage::Synthesis, e))?;

        state.set_stage(PipelineStage::Delivering);
        if !state.try_finalize() {
            warn!("Session {}: result already finalized, not delivering again", state.session_id());
            return Ok(CycleOutcome::AlreadyFinalized);
        }

        let prepared = self
            .speech_sender
            .prepare(&speech.audio, &speech.content_type, Some(language.to_string()))?;
        let transfer_id = prepared.metadata.transfer_id.clone();
        let bytes = prepared.metadata.total_bytes;

        self.speech_sender.send(prepared, out).await?;
        state.record_delivery();

        Ok(CycleOutcome::Delivered { transfer_id, bytes })
    }

    async fn conclude(
        &self,
        guard: ProcessingGuard,
        result: Result<CycleOutcome>,
        out: &mpsc::Sender<ServerMessage>,
    ) -> Result<CycleOutcome> {
        let state = guard.state();
        match &result {
            Ok(outcome) => info!("Session {}: cycle finished: {:?}", state.session_id(), outcome),
            Err(e) => {
                state.set_stage(PipelineStage::Failed);
                state.record_failure();
                error!("Session {}: cycle failed: {}", state.session_id(), e);
                if out.send(ServerMessage::error(e)).await.is_err() {
                    warn!("Session {}: could not report failure, channel closed", state.session_id());
                }
            }
        }

        drop(guard);
        result
    }
}

async fn emit(out: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> Result<()> {
    out.send(message).await.map_err(|_| RelayError::ChannelClosed)
}
