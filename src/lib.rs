pub mod audio;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod latch;
pub mod nats;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod transfer;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
    FileBackend, Utterance,
};
pub use client::{ClientCommand, ClientEvent, ConversationClient, TurnTakingController};
pub use config::Config;
pub use endpoint::{EndpointDetector, EndpointReason};
pub use error::{EngineError, ErrorKind, RelayError};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsEngines};
pub use pipeline::{Engines, PipelineOrchestrator};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{LanguagePair, RelaySession, SessionRegistry, SessionState, SessionStats};
pub use transfer::{ChunkSender, TransferReceiver};
