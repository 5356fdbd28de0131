pub mod backend;
pub mod convert;
pub mod file;
pub mod level;
pub mod utterance;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
pub use level::calculate_rms;
pub use utterance::{wav_duration, Utterance, WAV_MIME_TYPE};
