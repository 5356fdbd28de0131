//! Chunked transfer of binary payloads over a message channel
//!
//! The same protocol runs in both directions: the client uploads recorded
//! utterances and the server streams synthesized speech back.
//! - `start`: metadata (content type, chunk count, sizes)
//! - `chunk`: one indexed envelope, base64 payload
//! - `complete`: explicit completion, redundant with `is_last`

mod envelope;
mod receiver;
mod sender;

pub(crate) use envelope::base64_bytes;
pub use envelope::{ChunkEnvelope, TransferMetadata};
pub use receiver::{ReassembledPayload, TransferReceiver};
pub use sender::{split_payload, ChunkSender, PreparedTransfer, TransferMessage};
