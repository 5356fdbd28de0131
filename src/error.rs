//! Error types for the relay.
//!
//! `RelayError` is what gets reported to a session over the channel.
//! `EngineError` is what the transcription/translation/synthesis
//! collaborators return.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage an engine failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStage {
    Transcription,
    Translation,
    Synthesis,
}

impl std::fmt::Display for EngineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineStage::Transcription => "transcription",
            EngineStage::Translation => "translation",
            EngineStage::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine answered, but with an error
    #[error("engine rejected request: {0}")]
    Rejected(String),

    /// The engine could not be reached (timeout, no responders, broken connection)
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The engine answered with something we could not decode
    #[error("malformed engine response: {0}")]
    Malformed(String),
}

impl EngineError {
    /// Only transport-level failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("payload rejected: {size} bytes is below the {min} byte minimum")]
    InputRejected { size: usize, min: usize },

    #[error("still processing the previous utterance")]
    Busy,

    #[error("{stage} failed: {source}")]
    Engine {
        stage: EngineStage,
        #[source]
        source: EngineError,
    },

    #[error("transfer {transfer_id} incomplete: {message}")]
    TransportIncomplete { transfer_id: String, message: String },

    #[error("audio capture failed: {0}")]
    CaptureFailure(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("channel closed")]
    ChannelClosed,
}

/// Error category carried in the wire `error` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputRejected,
    Busy,
    Engine,
    TransportIncomplete,
    CaptureFailure,
    Protocol,
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InputRejected { .. } => ErrorKind::InputRejected,
            RelayError::Busy => ErrorKind::Busy,
            RelayError::Engine { .. } => ErrorKind::Engine,
            RelayError::TransportIncomplete { .. } => ErrorKind::TransportIncomplete,
            RelayError::CaptureFailure(_) => ErrorKind::CaptureFailure,
            RelayError::Protocol(_) | RelayError::ChannelClosed => ErrorKind::Protocol,
        }
    }

    pub fn engine(stage: EngineStage, source: EngineError) -> Self {
        RelayError::Engine { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_rejected_display() {
        let err = RelayError::InputRejected { size: 999, min: 1000 };
        assert_eq!(
            err.to_string(),
            "payload rejected: 999 bytes is below the 1000 byte minimum"
        );
        assert_eq!(err.kind(), ErrorKind::InputRejected);
    }

    #[test]
    fn test_engine_error_display_names_stage() {
        let err = RelayError::engine(
            EngineStage::Translation,
            EngineError::Unavailable("timed out".to_string()),
        );
        assert_eq!(err.to_string(), "translation failed: engine unavailable: timed out");
        assert_eq!(err.kind(), ErrorKind::Engine);
    }

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(EngineError::Unavailable("x".into()).is_transient());
        assert!(!EngineError::Rejected("x".into()).is_transient());
        assert!(!EngineError::Malformed("x".into()).is_transient());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TransportIncomplete).unwrap();
        assert_eq!(json, "\"transport_incomplete\"");
    }
}
