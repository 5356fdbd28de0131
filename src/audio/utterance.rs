use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// One bounded span of captured speech, ready to be uploaded or processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: String,
    pub audio: Vec<u8>,
    pub mime_type: String,
    /// Known for WAV payloads, `None` for compressed formats
    pub duration: Option<Duration>,
}

impl Utterance {
    /// Wrap an encoded payload, estimating its duration when it is WAV.
    pub fn from_bytes(id: impl Into<String>, audio: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let duration = wav_duration(&audio);
        Self {
            id: id.into(),
            audio,
            mime_type: mime_type.into(),
            duration,
        }
    }

    /// Encode captured 16-bit PCM as an in-memory WAV file.
    pub fn from_pcm(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV")?;
        }

        let frames = samples.len() as u64 / channels.max(1) as u64;
        Ok(Self {
            id: format!("utterance-{}", uuid::Uuid::new_v4()),
            audio: cursor.into_inner(),
            mime_type: WAV_MIME_TYPE.to_string(),
            duration: Some(Duration::from_millis(frames * 1000 / sample_rate.max(1) as u64)),
        })
    }

    pub fn byte_size(&self) -> usize {
        self.audio.len()
    }
}

/// Duration from a WAV header, if the bytes parse as WAV
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_millis(reader.duration() as u64 * 1000 / sample_rate as u64))
}
