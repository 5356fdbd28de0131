use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub relay: RelayConfig,
    pub detector: DetectorConfig,
    pub turn: TurnConfig,
    pub engines: EnginesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-interpreter".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

/// Transfer and session defaults shared by server and client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Payloads smaller than this are treated as noise and rejected
    pub min_payload_bytes: usize,
    /// Maximum payload bytes per chunk envelope
    pub chunk_size: usize,
    /// Pause between chunk sends so the channel is not saturated
    pub chunk_delay_ms: u64,
    /// MIME type assumed for raw binary uploads
    pub default_mime_type: String,
    pub default_source_language: String,
    pub default_target_language: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            min_payload_bytes: 1000,
            chunk_size: 16 * 1024,
            chunk_delay_ms: 10,
            default_mime_type: "audio/wav".to_string(),
            default_source_language: "en".to_string(),
            default_target_language: "es".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// Silence-based endpoint detection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Normalized RMS level (0.0 - 1.0) below which audio counts as silence
    pub silence_threshold: f32,
    /// Contiguous silence required before the utterance is closed
    pub silence_duration_ms: u64,
    /// How often the sampler reads the current level
    pub sample_interval_ms: u64,
    /// Hard cap on a single utterance
    pub max_utterance_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.04,
            silence_duration_ms: 1500,
            sample_interval_ms: 50,
            max_utterance_ms: 25_000,
        }
    }
}

impl DetectorConfig {
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn max_utterance(&self) -> Duration {
        Duration::from_millis(self.max_utterance_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Delay between the language swap and the next capture start
    pub settle_delay_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { settle_delay_ms: 300 }
    }
}

impl TurnConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// NATS subjects and retry policy for the STT / NMT / TTS engines
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub nats_url: String,
    pub transcribe_subject: String,
    pub translate_subject: String,
    pub synthesize_subject: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            transcribe_subject: "stt.transcribe".to_string(),
            translate_subject: "nmt.translate".to_string(),
            synthesize_subject: "tts.synthesize".to_string(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl Config {
    /// Load from a TOML file (extension optional) overlaid with
    /// `LOQA_INTERPRETER__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOQA_INTERPRETER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
