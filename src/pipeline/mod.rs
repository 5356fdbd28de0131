//! Transcribe → translate → synthesize, one cycle at a time per session

mod engines;
mod orchestrator;
mod retry;

pub use engines::{Engines, SynthesizedAudio, Synthesizer, Transcriber, Translator};
pub use orchestrator::{CycleOutcome, PipelineOrchestrator};
pub use retry::RetryPolicy;
