use std::time::Duration;

use super::client::NatsClient;
use super::messages::{
    into_result, SynthesizeReply, SynthesizeRequest, TranscribeReply, TranscribeRequest,
    TranslateReply, TranslateRequest,
};
use crate::config::EnginesConfig;
use crate::error::EngineError;
use crate::pipeline::{RetryPolicy, SynthesizedAudio, Synthesizer, Transcriber, Translator};

/// STT, NMT and TTS engines reached over NATS request/reply
pub struct NatsEngines {
    client: NatsClient,
    config: EnginesConfig,
}

impl NatsEngines {
    pub async fn connect(config: EnginesConfig) -> anyhow::Result<Self> {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        };
        let client = NatsClient::connect(
            &config.nats_url,
            Duration::from_millis(config.request_timeout_ms),
            retry,
        )
        .await?;

        Ok(Self { client, config })
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.client.close().await
    }
}

#[async_trait::async_trait]
impl Transcriber for NatsEngines {
    async fn transcribe(&self, audio: &[u8], encoding: &str, language: &str) -> Result<String, EngineError> {
        let request = TranscribeRequest {
            audio: audio.to_vec(),
            encoding: encoding.to_string(),
            language: language.to_string(),
        };
        let reply: TranscribeReply = self
            .client
            .request(&self.config.transcribe_subject, &request)
            .await?;
        reply.into_result()
    }
}

#[async_trait::async_trait]
impl Translator for NatsEngines {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, EngineError> {
        let request = TranslateRequest {
            text: text.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
        };
        let reply: TranslateReply = self
            .client
            .request(&self.config.translate_subject, &request)
            .await?;
        reply.into_result()
    }
}

#[async_trait::async_trait]
impl Synthesizer for NatsEngines {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, EngineError> {
        let request = SynthesizeRequest {
            text: text.to_string(),
            language: language.to_string(),
        };
        let reply: SynthesizeReply = self
            .client
            .request(&self.config.synthesize_subject, &request)
            .await?;

        let content_type = reply.content_type;
        let audio = into_result(reply.audio, reply.error, "audio")?;
        Ok(SynthesizedAudio { audio, content_type })
    }
}
