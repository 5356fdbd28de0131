use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::transfer::base64_bytes;

/// Request published to the STT engine
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    #[serde(with = "base64_bytes")]
    pub audio: Vec<u8>, // Base64-encoded audio bytes
    pub encoding: String,
    pub language: String,
}

/// Reply from the STT engine
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeReply {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request published to the NMT engine
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

/// Reply from the NMT engine
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateReply {
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request published to the TTS engine
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub language: String,
}

/// Reply from the TTS engine
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeReply {
    #[serde(default, with = "base64_bytes::optional")]
    pub audio: Option<Vec<u8>>,
    #[serde(default = "default_speech_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_speech_content_type() -> String {
    "audio/mpeg".to_string()
}

/// Turn an `{value, error}` reply into a result
pub(crate) fn into_result<T>(value: Option<T>, error: Option<String>, what: &str) -> Result<T, EngineError> {
    match (value, error) {
        (_, Some(message)) => Err(EngineError::Rejected(message)),
        (Some(value), None) => Ok(value),
        (None, None) => Err(EngineError::Malformed(format!("reply carries no {}", what))),
    }
}

impl TranscribeReply {
    pub fn into_result(self) -> Result<String, EngineError> {
        into_result(self.text, self.error, "text")
    }
}

impl TranslateReply {
    pub fn into_result(self) -> Result<String, EngineError> {
        into_result(self.translation, self.error, "translation")
    }
}
