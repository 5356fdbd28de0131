use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{calculate_rms, AudioBackend, AudioFrame, Utterance};
use crate::config::DetectorConfig;
use crate::endpoint::{EndpointDetector, EndpointReason, Sampler};
use crate::error::{RelayError, Result};

/// PCM gathered during one capture
#[derive(Debug, Default)]
struct CapturedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

struct ActiveCapture {
    sampler: Sampler,
    collector: JoinHandle<CapturedAudio>,
}

/// Drives one audio backend through capture → endpoint → utterance.
///
/// While capturing, frame energy is published to a sampler running a fresh
/// `EndpointDetector`. Endpoint reasons are sent on the events channel; the
/// owner reacts by calling `stop()`, which is a no-op when nothing is live.
pub struct CaptureController {
    backend: Box<dyn AudioBackend>,
    detector: DetectorConfig,
    events: mpsc::Sender<EndpointReason>,
    active: Option<ActiveCapture>,
}

impl CaptureController {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        detector: DetectorConfig,
        events: mpsc::Sender<EndpointReason>,
    ) -> Self {
        Self {
            backend,
            detector,
            events,
            active: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// Open the device and start endpoint detection.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            debug!("Capture already running on {}", self.backend.name());
            return Ok(());
        }

        let frames = self
            .backend
            .start()
            .await
            .map_err(|e| RelayError::CaptureFailure(format!("{}: {:#}", self.backend.name(), e)))?;

        let (level_tx, level_rx) = watch::channel(0.0f32);
        let collector = tokio::spawn(collect(frames, level_tx));

        let sampler = Sampler::spawn(
            EndpointDetector::from_config(&self.detector),
            level_rx,
            self.detector.sample_interval(),
            self.detector.max_utterance(),
            self.events.clone(),
        );

        info!("Capture started on {}", self.backend.name());
        self.active = Some(ActiveCapture { sampler, collector });
        Ok(())
    }

    /// End the capture and encode what was heard.
    ///
    /// Halts the sampler first (dropping any armed silence timer), then asks
    /// the backend for its final flush and releases it. Returns `None` when
    /// no capture was live.
    pub async fn stop(&mut self) -> Result<Option<Utterance>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };

        let reason = active.sampler.stop().await;
        debug!("Sampler halted ({:?})", reason);

        if let Err(e) = self.backend.stop().await {
            active.collector.abort();
            return Err(RelayError::CaptureFailure(format!(
                "{}: failed to stop: {:#}",
                self.backend.name(),
                e
            )));
        }

        let captured = active
            .collector
            .await
            .map_err(|e| RelayError::CaptureFailure(format!("collector task failed: {}", e)))?;

        let utterance = Utterance::from_pcm(
            &captured.samples,
            captured.sample_rate,
            captured.channels,
        )
        .map_err(|e| RelayError::CaptureFailure(format!("{:#}", e)))?;

        info!(
            "Capture stopped on {}: {} samples, {} bytes",
            self.backend.name(),
            captured.samples.len(),
            utterance.byte_size()
        );

        Ok(Some(utterance))
    }
}

/// Accumulate frames until the backend closes the channel.
async fn collect(mut frames: mpsc::Receiver<AudioFrame>, level: watch::Sender<f32>) -> CapturedAudio {
    let mut captured = CapturedAudio {
        samples: Vec::new(),
        sample_rate: 16000,
        channels: 1,
    };
    let mut first = true;

    while let Some(frame) = frames.recv().await {
        if first {
            captured.sample_rate = frame.sample_rate;
            captured.channels = frame.channels;
            first = false;
        } else if frame.sample_rate != captured.sample_rate || frame.channels != captured.channels {
            warn!(
                "Dropping frame with format {} Hz/{} ch, capture is {} Hz/{} ch",
                frame.sample_rate, frame.channels, captured.sample_rate, captured.channels
            );
            continue;
        }

        let _ = level.send(calculate_rms(&frame.samples));
        captured.samples.extend_from_slice(&frame.samples);
    }

    // Device gone: the sampler sees silence from here on
    let _ = level.send(0.0);
    captured
}
