use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::registry::SessionRegistry;
use super::state::{LanguagePair, SessionState};
use crate::audio::Utterance;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::pipeline::PipelineOrchestrator;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transfer::{ReassembledPayload, TransferReceiver};

/// Server side of one connection.
///
/// Every inbound message maps to one transition here. Pipeline cycles are
/// spawned so the loop keeps answering (and shedding work with `Busy`)
/// while a cycle is in flight.
pub struct RelaySession {
    state: Arc<SessionState>,
    orchestrator: Arc<PipelineOrchestrator>,
    registry: SessionRegistry,
    relay: RelayConfig,
    uploads: TransferReceiver,
    outbound: mpsc::Sender<ServerMessage>,
    in_flight: Option<JoinHandle<()>>,
}

impl RelaySession {
    /// Create and register a session for a new connection
    pub async fn open(
        registry: SessionRegistry,
        orchestrator: Arc<PipelineOrchestrator>,
        relay: RelayConfig,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<Self> {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        let languages = LanguagePair::new(
            relay.default_source_language.clone(),
            relay.default_target_language.clone(),
        );
        let state = Arc::new(SessionState::new(session_id.clone(), languages.clone()));
        registry.register(Arc::clone(&state)).await;

        info!("Session {} opened", session_id);

        outbound
            .send(ServerMessage::Connected {
                session_id,
                source_language: languages.source,
                target_language: languages.target,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        Ok(Self {
            state,
            orchestrator,
            registry,
            relay,
            uploads: TransferReceiver::new(),
            outbound,
            in_flight: None,
        })
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Drive the session from a channel until the client goes away
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ClientMessage>) {
        while let Some(message) = inbound.recv().await {
            self.handle(message).await;
        }
        self.close().await;
    }

    /// Handle one client message; failures go back to the client as `error`.
    pub async fn handle(&mut self, message: ClientMessage) {
        if let Err(e) = self.dispatch(message).await {
            self.report(e).await;
        }
    }

    /// A raw binary frame is a whole utterance in one message.
    pub async fn handle_binary(&mut self, bytes: Vec<u8>) {
        let utterance = Utterance::from_bytes(
            format!("utterance-{}", uuid::Uuid::new_v4()),
            bytes,
            self.relay.default_mime_type.clone(),
        );
        if let Err(e) = self.submit(utterance) {
            self.report(e).await;
        }
    }

    /// A frame that did not parse as a client message
    pub async fn handle_malformed(&self, error: impl std::fmt::Display) {
        self.report(RelayError::Protocol(format!("unreadable message: {}", error)))
            .await;
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::AudioStart(metadata) => self.uploads.begin(&metadata),

            ClientMessage::AudioChunk(envelope) => {
                if let Some(payload) = self.uploads.on_envelope(envelope)? {
                    self.accept_upload(payload).await?;
                }
                Ok(())
            }

            ClientMessage::AudioComplete { transfer_id } => {
                if let Some(payload) = self.uploads.on_complete_signal(&transfer_id)? {
                    self.accept_upload(payload).await?;
                }
                Ok(())
            }

            ClientMessage::ChangeLanguage {
                source_language,
                target_language,
            } => {
                self.state
                    .set_languages(LanguagePair::new(source_language.clone(), target_language.clone()))
                    .await;
                self.send(ServerMessage::LanguageChanged {
                    source_language,
                    target_language,
                })
                .await
            }

            ClientMessage::StartTranslation {
                text,
                source_language,
                target_language,
            } => {
                let guard = self.orchestrator.admit(&self.state)?;
                let orchestrator = Arc::clone(&self.orchestrator);
                let out = self.outbound.clone();
                let languages = LanguagePair::new(source_language, target_language);
                self.spawn_cycle(async move {
                    let _ = orchestrator.process_text(guard, text, languages, &out).await;
                });
                Ok(())
            }

            ClientMessage::GenerateSpeech { text, language } => {
                let guard = self.orchestrator.admit(&self.state)?;
                let orchestrator = Arc::clone(&self.orchestrator);
                let out = self.outbound.clone();
                self.spawn_cycle(async move {
                    let _ = orchestrator.process_speech(guard, text, language, &out).await;
                });
                Ok(())
            }

            ClientMessage::Ping { timestamp } => {
                self.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                })
                .await
            }
        }
    }

    async fn accept_upload(&mut self, payload: ReassembledPayload) -> Result<()> {
        let ReassembledPayload {
            transfer_id,
            content_type,
            bytes,
            missing,
            ..
        } = payload;

        if !missing.is_empty() {
            warn!(
                "Session {}: upload {} reassembled with {} missing chunks",
                self.state.session_id(),
                transfer_id,
                missing.len()
            );
        }

        let mime_type = content_type.unwrap_or_else(|| self.relay.default_mime_type.clone());
        let size = bytes.len();
        let utterance = Utterance::from_bytes(transfer_id.clone(), bytes, mime_type);
        self.submit(utterance)?;

        self.send(ServerMessage::AudioReceived {
            transfer_id,
            bytes: size,
        })
        .await
    }

    fn submit(&mut self, utterance: Utterance) -> Result<()> {
        let guard = self.orchestrator.admit_utterance(&self.state, &utterance)?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let out = self.outbound.clone();

        self.spawn_cycle(async move {
            let _ = orchestrator.process_utterance(guard, utterance, &out).await;
        });
        Ok(())
    }

    fn spawn_cycle<F>(&mut self, cycle: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        // The guard guarantees any previous cycle has released; its handle is done
        self.in_flight = Some(tokio::spawn(cycle));
    }

    async fn send(&self, message: ServerMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    async fn report(&self, e: RelayError) {
        match &e {
            RelayError::Busy | RelayError::InputRejected { .. } => {
                warn!("Session {}: {}", self.state.session_id(), e)
            }
            _ => error!("Session {}: {}", self.state.session_id(), e),
        }

        if self.outbound.send(ServerMessage::error(&e)).await.is_err() {
            debug!("Session {}: client gone, error not delivered", self.state.session_id());
        }
    }

    /// Unregister. An in-flight cycle is allowed to finish.
    pub async fn close(mut self) {
        let session_id = self.state.session_id().to_string();

        if let Some(task) = self.in_flight.take() {
            if let Err(e) = task.await {
                error!("Session {}: cycle task panicked: {}", session_id, e);
            }
        }

        if self.uploads.pending() > 0 {
            warn!(
                "Session {}: closing with {} unfinished uploads",
                session_id,
                self.uploads.pending()
            );
        }

        self.registry.remove(&session_id).await;
        info!("Session {} closed", session_id);
    }
}
