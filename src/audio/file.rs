use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::convert;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into frames of `frame_ms` each, converted to the target format
    pub fn frames(&self, config: &AudioBackendConfig) -> Vec<AudioFrame> {
        let frame_ms = config.buffer_duration_ms.max(1);
        let samples_per_frame =
            ((self.sample_rate as u64 * frame_ms / 1000) as usize * self.channels as usize).max(1);

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, samples)| {
                let frame = AudioFrame {
                    samples: samples.to_vec(),
                    sample_rate: self.sample_rate,
                    channels: self.channels,
                    timestamp_ms: i as u64 * frame_ms,
                };
                convert::process_frame(frame, config.target_sample_rate, config.target_channels)
            })
            .collect()
    }
}

/// Replays a WAV file through the capture path, one buffer per
/// `buffer_duration_ms`, so silence detection sees it in real time.
pub struct FileBackend {
    name: String,
    frames: Vec<AudioFrame>,
    frame_interval: Duration,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: &str, config: AudioBackendConfig) -> Result<Self> {
        let file = AudioFile::open(path)?;
        let frames = file.frames(&config);

        Ok(Self {
            name: format!("file:{}", path),
            frames,
            frame_interval: Duration::from_millis(config.buffer_duration_ms.max(1)),
            stop_tx: None,
            task: None,
        })
    }

    /// Backend over frames already in memory
    pub fn from_frames(name: &str, frames: Vec<AudioFrame>, frame_interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            frames,
            frame_interval,
            stop_tx: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.task.is_some() {
            anyhow::bail!("{} is already capturing", self.name);
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let frames = self.frames.clone();
        let frame_interval = self.frame_interval;
        let name = self.name.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            for frame in frames {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        // Final flush: the frame due next is still delivered
                        let _ = frame_tx.send(frame).await;
                        break;
                    }
                    _ = ticker.tick() => {
                        if frame_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("{} replay finished", name);
        });

        info!("Started capture from {}", self.name);
        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("{} replay task panicked: {}", self.name, e);
            }
            info!("Stopped capture from {}", self.name);
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
