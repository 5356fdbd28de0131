//! Messages exchanged over a session channel
//!
//! Frames are JSON objects tagged as `{"event": "...", "data": {...}}` with
//! camelCase fields. Chunk payloads are base64 inside the envelope.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RelayError};
use crate::transfer::{ChunkEnvelope, TransferMessage, TransferMetadata};

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announces an utterance upload
    AudioStart(TransferMetadata),

    /// One chunk of an utterance upload
    AudioChunk(ChunkEnvelope),

    /// Explicit end of an utterance upload
    #[serde(rename_all = "camelCase")]
    AudioComplete { transfer_id: String },

    #[serde(rename_all = "camelCase")]
    ChangeLanguage {
        source_language: String,
        target_language: String,
    },

    /// Translate (and speak) text the client already has
    #[serde(rename_all = "camelCase")]
    StartTranslation {
        text: String,
        source_language: String,
        target_language: String,
    },

    GenerateSpeech { text: String, language: String },

    Ping { timestamp: i64 },
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected {
        session_id: String,
        source_language: String,
        target_language: String,
    },

    #[serde(rename_all = "camelCase")]
    LanguageChanged {
        source_language: String,
        target_language: String,
    },

    #[serde(rename_all = "camelCase")]
    Pong { timestamp: i64, server_time: i64 },

    /// An utterance upload was reassembled and accepted for processing
    #[serde(rename_all = "camelCase")]
    AudioReceived { transfer_id: String, bytes: usize },

    #[serde(rename_all = "camelCase")]
    Transcription {
        utterance_id: String,
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },

    #[serde(rename_all = "camelCase")]
    TranslationStream {
        utterance_id: String,
        translation: String,
        partial: bool,
    },

    #[serde(alias = "metadata")]
    SpeechStart(TransferMetadata),

    #[serde(alias = "speechData")]
    SpeechChunk(ChunkEnvelope),

    #[serde(rename_all = "camelCase")]
    SpeechComplete { transfer_id: String },

    Error { kind: ErrorKind, message: String },
}

impl ServerMessage {
    pub fn error(err: &RelayError) -> Self {
        ServerMessage::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl TransferMessage for ClientMessage {
    fn start(metadata: TransferMetadata) -> Self {
        ClientMessage::AudioStart(metadata)
    }

    fn chunk(envelope: ChunkEnvelope) -> Self {
        ClientMessage::AudioChunk(envelope)
    }

    fn complete(transfer_id: String) -> Self {
        ClientMessage::AudioComplete { transfer_id }
    }
}

impl TransferMessage for ServerMessage {
    fn start(metadata: TransferMetadata) -> Self {
        ServerMessage::SpeechStart(metadata)
    }

    fn chunk(envelope: ChunkEnvelope) -> Self {
        ServerMessage::SpeechChunk(envelope)
    }

    fn complete(transfer_id: String) -> Self {
        ServerMessage::SpeechComplete { transfer_id }
    }
}
