// Tests for the engine request/reply messages carried over NATS

use base64::Engine;
use loqa_interpreter::config::EnginesConfig;
use loqa_interpreter::error::EngineError;
use loqa_interpreter::nats::messages::{
    SynthesizeReply, SynthesizeRequest, TranscribeReply, TranscribeRequest, TranslateReply,
    TranslateRequest,
};
use loqa_interpreter::NatsEngines;

#[test]
fn test_transcribe_request_serialization() {
    let audio = vec![0u8, 1, 2, 3, 250];
    let msg = TranscribeRequest {
        audio: audio.clone(),
        encoding: "audio/wav".to_string(),
        language: "en".to_string(),
    };

    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["encoding"], "audio/wav");
    assert_eq!(json["language"], "en");
    assert_eq!(
        json["audio"],
        base64::engine::general_purpose::STANDARD.encode(&audio)
    );

    let deserialized: TranscribeRequest = serde_json::from_value(json).unwrap();
    assert_eq!(deserialized.audio, audio);
}

#[test]
fn test_transcribe_reply_text() {
    let json = r#"{"text": "Hello, how are you?"}"#;
    let reply: TranscribeReply = serde_json::from_str(json).unwrap();
    assert_eq!(reply.into_result().unwrap(), "Hello, how are you?");
}

#[test]
fn test_transcribe_reply_error_wins() {
    let json = r#"{"text": "", "error": "unsupported encoding"}"#;
    let reply: TranscribeReply = serde_json::from_str(json).unwrap();
    assert_eq!(
        reply.into_result(),
        Err(EngineError::Rejected("unsupported encoding".to_string()))
    );
}

#[test]
fn test_empty_reply_is_malformed() {
    let reply: TranslateReply = serde_json::from_str("{}").unwrap();
    assert!(matches!(reply.into_result(), Err(EngineError::Malformed(_))));
}

#[test]
fn test_translate_request_fields() {
    let msg = TranslateRequest {
        text: "Hello, how are you?".to_string(),
        source_language: "en".to_string(),
        target_language: "es".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"source_language\":\"en\""));
    assert!(json.contains("\"target_language\":\"es\""));
}

#[test]
fn test_synthesize_reply_decodes_audio() {
    let audio = vec![0x49u8, 0x44, 0x33, 0x04];
    let json = format!(
        r#"{{"audio": "{}", "content_type": "audio/mpeg"}}"#,
        base64::engine::general_purpose::STANDARD.encode(&audio)
    );

    let reply: SynthesizeReply = serde_json::from_str(&json).unwrap();
    assert_eq!(reply.content_type, "audio/mpeg");
    assert_eq!(reply.audio, Some(audio));
    assert_eq!(reply.error, None);
}

#[test]
fn test_synthesize_reply_defaults() {
    let reply: SynthesizeReply = serde_json::from_str(r#"{"error": "voice not found"}"#).unwrap();
    assert_eq!(reply.audio, None);
    assert_eq!(reply.content_type, "audio/mpeg");
    assert_eq!(reply.error.as_deref(), Some("voice not found"));
}

#[test]
fn test_synthesize_request_serialization() {
    let msg = SynthesizeRequest {
        text: "Hola, ¿cómo estás?".to_string(),
        language: "es".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    let deserialized: SynthesizeRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.text, "Hola, ¿cómo estás?");
    assert_eq!(deserialized.language, "es");
}

#[tokio::test]
#[ignore = "requires a NATS server at localhost:4222"]
async fn test_engines_close_flushes_connection() {
    let engines = NatsEngines::connect(EnginesConfig::default()).await.unwrap();
    engines.close().await.unwrap();
}
