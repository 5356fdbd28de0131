use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::envelope::{ChunkEnvelope, TransferMetadata};
use crate::error::{RelayError, Result};

/// Message types that can carry the three frames of a chunked transfer.
///
/// Implemented by the client→server and server→client message enums so one
/// send loop serves both directions.
pub trait TransferMessage: Sized {
    fn start(metadata: TransferMetadata) -> Self;
    fn chunk(envelope: ChunkEnvelope) -> Self;
    fn complete(transfer_id: String) -> Self;
}

/// A payload split and ready to go out
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    pub metadata: TransferMetadata,
    pub envelopes: Vec<ChunkEnvelope>,
}

/// Splits payloads into chunk envelopes and pushes them onto a channel
#[derive(Debug, Clone)]
pub struct ChunkSender {
    chunk_size: usize,
    min_payload_bytes: usize,
    delay: Duration,
}

impl ChunkSender {
    pub fn new(chunk_size: usize, min_payload_bytes: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            min_payload_bytes,
            delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive chunks
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Validate and split a payload under a fresh transfer ID.
    ///
    /// Empty or undersized payloads are rejected here, before anything is sent.
    pub fn prepare(
        &self,
        payload: &[u8],
        content_type: &str,
        language: Option<String>,
    ) -> Result<PreparedTransfer> {
        if payload.is_empty() || payload.len() < self.min_payload_bytes {
            return Err(RelayError::InputRejected {
                size: payload.len(),
                min: self.min_payload_bytes,
            });
        }

        let transfer_id = format!("transfer-{}", uuid::Uuid::new_v4());
        let envelopes = split_payload(&transfer_id, payload, self.chunk_size);

        Ok(PreparedTransfer {
            metadata: TransferMetadata {
                transfer_id,
                content_type: content_type.to_string(),
                total_chunks: envelopes.len() as u32,
                chunk_size: self.chunk_size,
                total_bytes: payload.len(),
                language,
            },
            envelopes,
        })
    }

    /// Send start, every chunk in index order, then the explicit completion.
    pub async fn send<M: TransferMessage>(
        &self,
        prepared: PreparedTransfer,
        tx: &mpsc::Sender<M>,
    ) -> Result<()> {
        let transfer_id = prepared.metadata.transfer_id.clone();
        let total = prepared.envelopes.len();

        info!(
            "Sending transfer {} ({} bytes in {} chunks of {})",
            transfer_id, prepared.metadata.total_bytes, total, self.chunk_size
        );

        tx.send(M::start(prepared.metadata))
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        for envelope in prepared.envelopes {
            let index = envelope.index;
            debug!("Sending chunk {}/{} of {}", index + 1, total, transfer_id);

            tx.send(M::chunk(envelope))
                .await
                .map_err(|_| RelayError::ChannelClosed)?;

            if !self.delay.is_zero() && (index as usize) + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        tx.send(M::complete(transfer_id))
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        Ok(())
    }
}

/// Split `payload` into `ceil(len / chunk_size)` envelopes.
pub fn split_payload(transfer_id: &str, payload: &[u8], chunk_size: usize) -> Vec<ChunkEnvelope> {
    let chunk_size = chunk_size.max(1);
    let total_count = payload.len().div_ceil(chunk_size) as u32;

    payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, bytes)| {
            let index = index as u32;
            ChunkEnvelope {
                transfer_id: transfer_id.to_string(),
                index,
                total_count,
                payload: bytes.to_vec(),
                is_last: index + 1 == total_count,
            }
        })
        .collect()
}
