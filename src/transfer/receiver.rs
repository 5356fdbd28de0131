use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

use super::envelope::{ChunkEnvelope, TransferMetadata};
use crate::error::{RelayError, Result};
use crate::latch::Latch;

/// Finalized transfers remembered so late chunks and signals stay no-ops
const TOMBSTONES_KEPT: usize = 16;

/// A transfer put back together, ready for exactly one consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledPayload {
    pub transfer_id: String,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub bytes: Vec<u8>,
    /// Indices that never arrived and were skipped
    pub missing: Vec<u32>,
}

impl ReassembledPayload {
    pub fn is_gap_free(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Receiver-side state for one transfer
#[derive(Debug)]
struct Transfer {
    total_count: u32,
    content_type: Option<String>,
    language: Option<String>,
    chunks: BTreeMap<u32, Vec<u8>>,
    last_seen: bool,
    finalized: Latch,
}

impl Transfer {
    fn new(total_count: u32) -> Self {
        Self {
            total_count,
            content_type: None,
            language: None,
            chunks: BTreeMap::new(),
            last_seen: false,
            finalized: Latch::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.chunks.len() as u32 == self.total_count
    }

    /// Concatenate chunks by index, skipping gaps.
    ///
    /// The chunk map is drained; the latch stays behind as a tombstone so
    /// late chunks and duplicate completion signals are ignored.
    fn reassemble(&mut self, transfer_id: &str) -> Result<ReassembledPayload> {
        let mut chunks = std::mem::take(&mut self.chunks);
        let mut bytes = Vec::with_capacity(chunks.values().map(Vec::len).sum());
        let mut missing = Vec::new();

        for index in 0..self.total_count {
            match chunks.remove(&index) {
                Some(payload) => bytes.extend_from_slice(&payload),
                None => {
                    warn!("Transfer {} missing chunk {}, skipping", transfer_id, index);
                    missing.push(index);
                }
            }
        }

        if missing.len() as u32 == self.total_count {
            return Err(RelayError::TransportIncomplete {
                transfer_id: transfer_id.to_string(),
                message: format!("none of {} chunks arrived", self.total_count),
            });
        }

        Ok(ReassembledPayload {
            transfer_id: transfer_id.to_string(),
            content_type: self.content_type.clone(),
            language: self.language.clone(),
            bytes,
            missing,
        })
    }
}

/// Reassembles incoming transfers keyed by transfer ID.
///
/// A transfer is finalized as soon as every index has arrived, or when an
/// explicit completion signal arrives (gaps are then skipped). An `is_last`
/// chunk that arrives ahead of its siblings only marks the transfer; it
/// completes once the gaps fill or the completion signal comes in. Whichever
/// trigger wins, the finalize latch makes every later one a no-op.
///
/// Only the most recent finalized transfers are remembered. Announcing a
/// new transfer drops any that were left incomplete.
#[derive(Debug, Default)]
pub struct TransferReceiver {
    transfers: HashMap<String, Transfer>,
    tombstones: VecDeque<String>,
}

impl TransferReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register transfer metadata. May arrive before or after the first chunk.
    pub fn begin(&mut self, metadata: &TransferMetadata) -> Result<()> {
        if metadata.total_chunks == 0 {
            return Err(RelayError::Protocol(format!(
                "transfer {} declares zero chunks",
                metadata.transfer_id
            )));
        }

        if !self.transfers.contains_key(&metadata.transfer_id) {
            self.drop_abandoned();
        }

        let transfer = self
            .transfers
            .entry(metadata.transfer_id.clone())
            .or_insert_with(|| Transfer::new(metadata.total_chunks));

        if transfer.total_count != metadata.total_chunks {
            return Err(RelayError::Protocol(format!(
                "transfer {} announced {} chunks but chunks declare {}",
                metadata.transfer_id, metadata.total_chunks, transfer.total_count
            )));
        }

        transfer.content_type = Some(metadata.content_type.clone());
        transfer.language = metadata.language.clone();

        info!(
            "Receiving transfer {} ({} chunks, {} bytes, {})",
            metadata.transfer_id, metadata.total_chunks, metadata.total_bytes, metadata.content_type
        );

        Ok(())
    }

    /// Store one chunk. Returns the payload if this chunk completed the transfer.
    pub fn on_envelope(&mut self, envelope: ChunkEnvelope) -> Result<Option<ReassembledPayload>> {
        envelope.validate()?;

        let ChunkEnvelope {
            transfer_id,
            index,
            total_count,
            payload,
            is_last,
        } = envelope;

        let transfer = self
            .transfers
            .entry(transfer_id.clone())
            .or_insert_with(|| Transfer::new(total_count));

        if transfer.finalized.is_set() {
            debug!("Ignoring chunk {} of finalized transfer {}", index, transfer_id);
            return Ok(None);
        }

        if transfer.total_count != total_count {
            return Err(RelayError::Protocol(format!(
                "chunk {} of transfer {} declares {} chunks, expected {}",
                index, transfer_id, total_count, transfer.total_count
            )));
        }

        if transfer.chunks.contains_key(&index) {
            warn!("Duplicate chunk {} for transfer {}, ignoring", index, transfer_id);
            return Ok(None);
        }

        debug!(
            "Chunk {}/{} of {} ({} bytes)",
            index + 1,
            total_count,
            transfer_id,
            payload.len()
        );
        transfer.chunks.insert(index, payload);
        transfer.last_seen |= is_last;

        if transfer.is_complete() {
            let result = Self::finalize(transfer, &transfer_id);
            self.retire(&transfer_id);
            return result;
        }

        if is_last {
            debug!(
                "Last chunk of {} arrived with {}/{} chunks, waiting for the rest",
                transfer_id,
                transfer.chunks.len(),
                transfer.total_count
            );
        }

        Ok(None)
    }

    /// Explicit completion signal. Finalizes with whatever has arrived.
    pub fn on_complete_signal(&mut self, transfer_id: &str) -> Result<Option<ReassembledPayload>> {
        let Some(transfer) = self.transfers.get_mut(transfer_id) else {
            return Err(RelayError::TransportIncomplete {
                transfer_id: transfer_id.to_string(),
                message: "completion signalled but no chunks arrived".to_string(),
            });
        };

        let result = Self::finalize(transfer, transfer_id);
        self.retire(transfer_id);
        result
    }

    /// Whether the transfer has already been handed to its consumer
    pub fn is_finalized(&self, transfer_id: &str) -> bool {
        self.transfers
            .get(transfer_id)
            .is_some_and(|t| t.finalized.is_set())
    }

    /// Number of transfers still collecting chunks
    pub fn pending(&self) -> usize {
        self.transfers
            .values()
            .filter(|t| !t.finalized.is_set())
            .count()
    }

    /// Drop transfers that never finalized
    fn drop_abandoned(&mut self) {
        self.transfers.retain(|transfer_id, transfer| {
            let keep = transfer.finalized.is_set();
            if !keep {
                warn!(
                    "Dropping abandoned transfer {} ({}/{} chunks)",
                    transfer_id,
                    transfer.chunks.len(),
                    transfer.total_count
                );
            }
            keep
        });
    }

    /// Remember a finalized transfer, forgetting the oldest beyond the limit
    fn retire(&mut self, transfer_id: &str) {
        if self.tombstones.iter().any(|t| t == transfer_id) {
            return;
        }
        self.tombstones.push_back(transfer_id.to_string());

        while self.tombstones.len() > TOMBSTONES_KEPT {
            if let Some(oldest) = self.tombstones.pop_front() {
                self.transfers.remove(&oldest);
            }
        }
    }

    fn finalize(transfer: &mut Transfer, transfer_id: &str) -> Result<Option<ReassembledPayload>> {
        if !transfer.finalized.try_set() {
            debug!("Transfer {} already finalized", transfer_id);
            return Ok(None);
        }

        let payload = transfer.reassemble(transfer_id)?;
        info!(
            "Transfer {} reassembled: {} bytes ({} missing chunks, last chunk seen: {})",
            transfer_id,
            payload.bytes.len(),
            payload.missing.len(),
            transfer.last_seen
        );
        Ok(Some(payload))
    }
}
