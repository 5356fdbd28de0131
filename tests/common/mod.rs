// Shared fixtures for integration tests: in-process engines and helpers
#![allow(dead_code)]

use loqa_interpreter::audio::Utterance;
use loqa_interpreter::error::{EngineError, EngineStage};
use loqa_interpreter::pipeline::{Engines, SynthesizedAudio, Synthesizer, Transcriber, Translator};
use loqa_interpreter::protocol::ServerMessage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Scripted STT/NMT/TTS engines
pub struct FakeEngines {
    pub delay: Duration,
    pub fail_at: Option<EngineStage>,
    pub empty_transcript: bool,
    pub speech_bytes: usize,
    pub transcribe_calls: AtomicUsize,
    pub translate_calls: AtomicUsize,
    pub synthesize_calls: AtomicUsize,
    pub translations: Mutex<Vec<(String, String)>>,
    /// Pushed one by one before the final translation
    pub partials: Vec<String>,
    /// Partials the pipeline accepted
    pub partials_sent: AtomicUsize,
}

impl Default for FakeEngines {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_at: None,
            empty_transcript: false,
            speech_bytes: 40 * 1024,
            transcribe_calls: AtomicUsize::new(0),
            translate_calls: AtomicUsize::new(0),
            synthesize_calls: AtomicUsize::new(0),
            translations: Mutex::new(Vec::new()),
            partials: Vec::new(),
            partials_sent: AtomicUsize::new(0),
        }
    }
}

impl FakeEngines {
    pub fn engines(self: &Arc<Self>) -> Engines {
        Engines::shared(Arc::clone(self))
    }

    fn check(&self, stage: EngineStage) -> Result<(), EngineError> {
        if self.fail_at == Some(stage) {
            return Err(EngineError::Rejected(format!("{} engine down", stage)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transcriber for FakeEngines {
    async fn transcribe(&self, _audio: &[u8], _encoding: &str, language: &str) -> Result<String, EngineError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.check(EngineStage::Transcription)?;

        if self.empty_transcript {
            return Ok("   ".to_string());
        }
        Ok(match language {
            "es" => "Muy bien, gracias.".to_string(),
            _ => "Hello, how are you?".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Translator for FakeEngines {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, EngineError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        self.check(EngineStage::Translation)?;
        self.translations
            .lock()
            .unwrap()
            .push((source.to_string(), target.to_string()));

        Ok(match (text, target) {
            ("Hello, how are you?", "es") => "Hola, ¿cómo estás?".to_string(),
            ("Muy bien, gracias.", "en") => "Very well, thanks.".to_string(),
            (other, _) => format!("[{}] {}", target, other),
        })
    }

    async fn translate_incremental(
        &self,
        text: &str,
        source: &str,
        target: &str,
        partials: mpsc::Sender<String>,
    ) -> Result<String, EngineError> {
        for partial in &self.partials {
            if partials.send(partial.clone()).await.is_err() {
                break;
            }
            self.partials_sent.fetch_add(1, Ordering::SeqCst);
        }
        drop(partials);
        self.translate(text, source, target).await
    }
}

#[async_trait::async_trait]
impl Synthesizer for FakeEngines {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<SynthesizedAudio, EngineError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        self.check(EngineStage::Synthesis)?;
        Ok(SynthesizedAudio {
            audio: vec![0x55; self.speech_bytes],
            content_type: "audio/mpeg".to_string(),
        })
    }
}

/// About 50 KB of 16kHz mono WAV
pub fn wav_utterance() -> Utterance {
    Utterance::from_pcm(&vec![4000i16; 25_000], 16000, 1).unwrap()
}

/// Next server message, failing the test if none arrives in time
pub async fn next_message(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("server message within timeout")
        .expect("channel open")
}

/// Collect messages until `done` matches one (inclusive)
pub async fn collect_until(
    rx: &mut mpsc::Receiver<ServerMessage>,
    done: impl Fn(&ServerMessage) -> bool,
) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    loop {
        let message = next_message(rx).await;
        let finished = done(&message);
        messages.push(message);
        if finished {
            return messages;
        }
    }
}
