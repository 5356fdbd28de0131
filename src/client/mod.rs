//! Client side of a conversation
//!
//! Capture with endpoint detection, chunked upload, speech playback and
//! automatic turn-taking between the two speakers.

mod capture;
mod conversation;
mod playback;
mod turn;

pub use capture::CaptureController;
pub use conversation::{ClientCommand, ClientEvent, ConversationClient};
pub use playback::{FilePlayer, PlaybackEnded, Player};
pub use turn::{TurnDecision, TurnTakingController};
