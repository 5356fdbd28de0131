use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::capture::CaptureController;
use super::playback::{PlaybackEnded, Player};
use super::turn::{TurnDecision, TurnTakingController};
use crate::audio::{AudioBackend, Utterance};
use crate::config::Config;
use crate::endpoint::EndpointReason;
use crate::error::{ErrorKind, RelayError, Result};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::LanguagePair;
use crate::transfer::{ChunkSender, ReassembledPayload, TransferReceiver};

/// Content type assumed for synthesized speech announced without one
const DEFAULT_SPEECH_TYPE: &str = "audio/mpeg";

/// How many final transcript IDs are remembered for deduplication
const FINALS_REMEMBERED: usize = 8;

/// User-level controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    StartListening,
    /// Stop capturing and send what was heard
    StopListening,
    Shutdown,
}

/// What the client surfaces to its UI
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { session_id: String, languages: LanguagePair },
    CaptureStarted { languages: LanguagePair },
    CaptureStopped { reason: Option<EndpointReason> },
    UtteranceSent { transfer_id: String, bytes: usize },
    UtteranceDiscarded { bytes: usize },
    Transcript { utterance_id: String, text: String },
    Translation { utterance_id: String, text: String, partial: bool },
    PlaybackStarted { playback_id: String, bytes: usize },
    TurnSwapped(LanguagePair),
    Error { kind: ErrorKind, message: String },
    /// Automatic turn-taking stopped after a capture failure
    Halted,
}

/// Most recent IDs, oldest forgotten first
struct RecentIds {
    ids: VecDeque<String>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// False if `id` is already remembered
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.iter().any(|seen| seen == id) {
            return false;
        }
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id.to_string());
        true
    }
}

struct Inbox {
    endpoints: mpsc::Receiver<EndpointReason>,
    playback_ended: mpsc::Receiver<PlaybackEnded>,
    restarts: mpsc::Receiver<()>,
}

/// Client side of a conversation.
///
/// Captures an utterance, uploads it in chunks, shows the transcript and
/// translation, plays the synthesized reply once and hands the turn to the
/// other speaker.
pub struct ConversationClient {
    capture: CaptureController,
    player: Box<dyn Player>,
    turn: TurnTakingController,
    uploader: ChunkSender,
    downloads: TransferReceiver,
    languages: LanguagePair,
    transcript: String,
    translation: String,
    finals_seen: RecentIds,
    outbound: mpsc::Sender<ClientMessage>,
    events: mpsc::Sender<ClientEvent>,
    playback_ended: mpsc::Sender<PlaybackEnded>,
    inbox: Option<Inbox>,
}

impl ConversationClient {
    pub fn new(
        config: &Config,
        backend: Box<dyn AudioBackend>,
        player: Box<dyn Player>,
        outbound: mpsc::Sender<ClientMessage>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let (endpoint_tx, endpoint_rx) = mpsc::channel(4);
        let (ended_tx, ended_rx) = mpsc::channel(4);
        let (restart_tx, restart_rx) = mpsc::channel(4);

        Self {
            capture: CaptureController::new(backend, config.detector.clone(), endpoint_tx),
            player,
            turn: TurnTakingController::new(config.turn.settle_delay(), restart_tx),
            uploader: ChunkSender::new(config.relay.chunk_size, config.relay.min_payload_bytes)
                .with_delay(config.relay.chunk_delay()),
            downloads: TransferReceiver::new(),
            languages: LanguagePair::new(
                config.relay.default_source_language.clone(),
                config.relay.default_target_language.clone(),
            ),
            transcript: String::new(),
            translation: String::new(),
            finals_seen: RecentIds::new(FINALS_REMEMBERED),
            outbound,
            events,
            playback_ended: ended_tx,
            inbox: Some(Inbox {
                endpoints: endpoint_rx,
                playback_ended: ended_rx,
                restarts: restart_rx,
            }),
        }
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    /// Dispatch loop; returns when the server goes away or on `Shutdown`.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<ServerMessage>,
        mut commands: mpsc::Receiver<ClientCommand>,
    ) -> Result<()> {
        let Some(mut inbox) = self.inbox.take() else {
            return Err(RelayError::Protocol("client is already running".into()));
        };

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.on_server_message(message).await,
                    None => {
                        info!("Server channel closed");
                        break;
                    }
                },
                Some(reason) = inbox.endpoints.recv() => self.finish_capture(Some(reason)).await,
                Some(ended) = inbox.playback_ended.recv() => self.on_playback_ended(ended).await,
                Some(()) = inbox.restarts.recv() => self.on_restart().await,
                command = commands.recv() => match command {
                    Some(ClientCommand::StartListening) => {
                        self.turn.resume();
                        let _ = self.start_capture().await;
                    }
                    Some(ClientCommand::StopListening) => self.finish_capture(None).await,
                    Some(ClientCommand::Shutdown) | None => break,
                },
            }
        }

        if let Err(e) = self.capture.stop().await {
            warn!("Capture did not stop cleanly: {}", e);
        }
        Ok(())
    }

    async fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                session_id,
                source_language,
                target_language,
            } => {
                self.languages = LanguagePair::new(source_language, target_language);
                info!("Connected as {}", session_id);
                self.emit(ClientEvent::Connected {
                    session_id,
                    languages: self.languages.clone(),
                })
                .await;
            }

            ServerMessage::LanguageChanged {
                source_language,
                target_language,
            } => {
                debug!("Server confirmed {} → {}", source_language, target_language);
                self.languages = LanguagePair::new(source_language, target_language);
            }

            ServerMessage::Pong { timestamp, server_time } => {
                debug!("Pong: sent {}, server {}", timestamp, server_time);
            }

            ServerMessage::AudioReceived { transfer_id, bytes } => {
                debug!("Server accepted {} ({} bytes)", transfer_id, bytes);
            }

            ServerMessage::Transcription {
                utterance_id,
                text,
                is_final,
            } => self.on_transcription(utterance_id, text, is_final).await,

            ServerMessage::TranslationStream {
                utterance_id,
                translation,
                partial,
            } => {
                let nothing_to_say = !partial && translation.trim().is_empty();
                if !partial {
                    self.translation = translation.clone();
                }
                self.emit(ClientEvent::Translation {
                    utterance_id,
                    text: translation,
                    partial,
                })
                .await;

                // No speech follows an empty translation
                if nothing_to_say {
                    info!("Empty translation, listening again");
                    self.resume_listening().await;
                }
            }

            ServerMessage::SpeechStart(metadata) => {
                if let Err(e) = self.downloads.begin(&metadata) {
                    self.download_failed(e).await;
                }
            }

            ServerMessage::SpeechChunk(envelope) => match self.downloads.on_envelope(envelope) {
                Ok(Some(payload)) => self.play(payload).await,
                Ok(None) => {}
                Err(e) => self.download_failed(e).await,
            },

            ServerMessage::SpeechComplete { transfer_id } => {
                match self.downloads.on_complete_signal(&transfer_id) {
                    Ok(Some(payload)) => self.play(payload).await,
                    Ok(None) => {}
                    Err(e) => self.download_failed(e).await,
                }
            }

            ServerMessage::Error { kind, message } => {
                warn!("Server error ({:?}): {}", kind, message);
                self.emit(ClientEvent::Error { kind, message }).await;
                // Busy leaves the in-flight cycle and its text alone
                if kind != ErrorKind::Busy {
                    self.resume_listening().await;
                }
            }
        }
    }

    async fn on_transcription(&mut self, utterance_id: String, text: String, is_final: bool) {
        if !is_final {
            self.transcript = text;
            return;
        }

        if !self.finals_seen.insert(&utterance_id) {
            debug!("Duplicate final transcript for {}", utterance_id);
            return;
        }

        let empty = text.trim().is_empty();
        self.transcript = text.clone();
        self.emit(ClientEvent::Transcript { utterance_id, text }).await;

        if empty {
            info!("Nothing was heard, listening again");
            self.resume_listening().await;
        }
    }

    /// The reply is lost; give the floor back to the same speaker.
    async fn download_failed(&mut self, e: RelayError) {
        self.report(e).await;
        self.resume_listening().await;
    }

    async fn play(&mut self, payload: ReassembledPayload) {
        if !payload.is_gap_free() {
            warn!(
                "Speech {} missing chunks {:?}, playing what arrived",
                payload.transfer_id, payload.missing
            );
        }

        let ReassembledPayload {
            transfer_id,
            content_type,
            bytes,
            ..
        } = payload;
        let size = bytes.len();
        let content_type = content_type.unwrap_or_else(|| DEFAULT_SPEECH_TYPE.to_string());

        match self
            .player
            .play(&transfer_id, bytes, &content_type, self.playback_ended.clone())
            .await
        {
            Ok(()) => {
                self.emit(ClientEvent::PlaybackStarted {
                    playback_id: transfer_id,
                    bytes: size,
                })
                .await
            }
            Err(e) => {
                error!("Playback of {} failed: {:#}", transfer_id, e);
                self.emit(ClientEvent::Error {
                    kind: ErrorKind::Protocol,
                    message: format!("playback failed: {:#}", e),
                })
                .await;
                self.resume_listening().await;
            }
        }
    }

    async fn on_playback_ended(&mut self, ended: PlaybackEnded) {
        match self.turn.on_playback_complete(&ended.playback_id, &self.languages) {
            TurnDecision::Swapped(next) => {
                self.languages = next.clone();
                self.transcript.clear();
                self.translation.clear();

                let change = ClientMessage::ChangeLanguage {
                    source_language: next.source.clone(),
                    target_language: next.target.clone(),
                };
                if self.outbound.send(change).await.is_err() {
                    self.report(RelayError::ChannelClosed).await;
                }
                self.emit(ClientEvent::TurnSwapped(next)).await;
            }
            TurnDecision::Ignored => {}
        }
    }

    async fn on_restart(&mut self) {
        let result = self.start_capture().await;
        self.turn.restart_finished(&result);
        if result.is_err() {
            self.emit(ClientEvent::Halted).await;
        }
    }

    /// Listen again for the same speaker unless a turn restart owns that.
    async fn resume_listening(&mut self) {
        if self.turn.is_halted() || self.turn.is_restart_pending() {
            return;
        }
        let _ = self.start_capture().await;
    }

    async fn start_capture(&mut self) -> Result<()> {
        if self.capture.is_capturing() {
            return Ok(());
        }

        match self.capture.start().await {
            Ok(()) => {
                self.emit(ClientEvent::CaptureStarted {
                    languages: self.languages.clone(),
                })
                .await;
                Ok(())
            }
            Err(e) => {
                self.report(e.clone()).await;
                Err(e)
            }
        }
    }

    async fn finish_capture(&mut self, reason: Option<EndpointReason>) {
        if !self.capture.is_capturing() {
            return;
        }

        let stopped = self.capture.stop().await;
        self.emit(ClientEvent::CaptureStopped { reason }).await;

        match stopped {
            Ok(Some(utterance)) => self.upload(utterance).await,
            Ok(None) => {}
            Err(e) => self.report(e).await,
        }
    }

    async fn upload(&mut self, utterance: Utterance) {
        let prepared = match self.uploader.prepare(
            &utterance.audio,
            &utterance.mime_type,
            Some(self.languages.source.clone()),
        ) {
            Ok(prepared) => prepared,
            Err(RelayError::InputRejected { size, .. }) => {
                info!("Utterance too short ({} bytes), not sending", size);
                self.emit(ClientEvent::UtteranceDiscarded { bytes: size }).await;
                self.resume_listening().await;
                return;
            }
            Err(e) => {
                self.report(e).await;
                return;
            }
        };

        self.emit(ClientEvent::UtteranceSent {
            transfer_id: prepared.metadata.transfer_id.clone(),
            bytes: prepared.metadata.total_bytes,
        })
        .await;

        let uploader = self.uploader.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            if let Err(e) = uploader.send(prepared, &outbound).await {
                warn!("Upload interrupted: {}", e);
            }
        });
    }

    async fn report(&self, e: RelayError) {
        error!("{}", e);
        self.emit(ClientEvent::Error {
            kind: e.kind(),
            message: e.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Client event listener gone");
        }
    }
}
