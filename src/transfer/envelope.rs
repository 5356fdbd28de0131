use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// One indexed piece of a chunked transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    pub transfer_id: String,
    pub index: u32,
    pub total_count: u32,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub is_last: bool,
}

impl ChunkEnvelope {
    /// Check index range and the `is_last` placement.
    pub fn validate(&self) -> Result<()> {
        if self.total_count == 0 {
            return Err(RelayError::Protocol(format!(
                "transfer {} declares zero chunks",
                self.transfer_id
            )));
        }

        if self.index >= self.total_count {
            return Err(RelayError::Protocol(format!(
                "chunk {} out of range for transfer {} ({} chunks)",
                self.index, self.transfer_id, self.total_count
            )));
        }

        let final_index = self.index + 1 == self.total_count;
        if self.is_last != final_index {
            return Err(RelayError::Protocol(format!(
                "chunk {} of transfer {} has is_last={} but {} chunks were declared",
                self.index, self.transfer_id, self.is_last, self.total_count
            )));
        }

        Ok(())
    }
}

/// Announces a transfer before (or alongside) its first chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub transfer_id: String,
    pub content_type: String,
    pub total_chunks: u32,
    pub chunk_size: usize,
    pub total_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Base64 (standard alphabet) for binary payloads inside JSON frames
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }

    /// Same encoding for an optional payload; absent or null decodes to `None`
    pub mod optional {
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|encoded| {
                    base64::engine::general_purpose::STANDARD
                        .decode(encoded.as_bytes())
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
