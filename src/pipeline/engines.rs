use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// Synthesized speech as returned by the TTS engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub audio: Vec<u8>,
    pub content_type: String,
}

/// Speech-to-text collaborator
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// `encoding` is the MIME type of `audio`; `language` is a hint
    async fn transcribe(&self, audio: &[u8], encoding: &str, language: &str) -> Result<String, EngineError>;
}

/// Machine translation collaborator
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, EngineError>;

    /// Translate while pushing partial results to `partials`.
    ///
    /// Engines without streaming support answer in one shot.
    async fn translate_incremental(
        &self,
        text: &str,
        source: &str,
        target: &str,
        partials: mpsc::Sender<String>,
    ) -> Result<String, EngineError> {
        drop(partials);
        self.translate(text, source, target).await
    }
}

/// Text-to-speech collaborator
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, EngineError>;
}

/// The three collaborators a pipeline needs
#[derive(Clone)]
pub struct Engines {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Engines {
    /// Use one value that implements all three engines
    pub fn shared<E>(engine: Arc<E>) -> Self
    where
        E: Transcriber + Translator + Synthesizer + 'static,
    {
        Self {
            transcriber: engine.clone(),
            translator: engine.clone(),
            synthesizer: engine,
        }
    }
}
