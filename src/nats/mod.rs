pub mod client;
pub mod engines;
pub mod messages;

pub use client::NatsClient;
pub use engines::NatsEngines;
pub use messages::{
    SynthesizeReply, SynthesizeRequest, TranscribeReply, TranscribeRequest, TranslateReply,
    TranslateRequest,
};
