use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::detector::{DetectorEvent, EndpointDetector};

/// Why the sampler ended an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointReason {
    Silence,
    /// Safety valve: utterance hit the maximum duration
    MaxDuration,
}

/// Periodic task polling the live level and running the endpoint detector.
///
/// Reports at most one `EndpointReason` per capture and exits; `stop()`
/// halts it within one sampling interval.
pub struct Sampler {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Option<EndpointReason>>,
}

impl Sampler {
    pub fn spawn(
        mut detector: EndpointDetector,
        level_rx: watch::Receiver<f32>,
        sample_interval: Duration,
        max_utterance: Duration,
        events: mpsc::Sender<EndpointReason>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval(sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let reason = loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => {
                        debug!("Sampler stopped before endpoint");
                        return None;
                    }
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        if now.duration_since(started) >= max_utterance {
                            warn!("Utterance reached {:?}, forcing stop", max_utterance);
                            break EndpointReason::MaxDuration;
                        }

                        let level = *level_rx.borrow();
                        match detector.observe(level, now) {
                            DetectorEvent::SilenceTimeoutFired => break EndpointReason::Silence,
                            DetectorEvent::SilenceStarted => debug!("Silence started (level {:.4})", level),
                            DetectorEvent::Continue => {}
                        }
                    }
                }
            };

            info!("Endpoint detected: {:?}", reason);
            if events.send(reason).await.is_err() {
                debug!("Endpoint listener gone");
            }
            Some(reason)
        });

        Self { stop_tx, task }
    }

    /// Halt sampling and drop any armed silence timer.
    ///
    /// Returns the endpoint reason if one fired before the stop.
    pub async fn stop(self) -> Option<EndpointReason> {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(reason) => reason,
            Err(e) => {
                warn!("Sampler task panicked: {}", e);
                None
            }
        }
    }
}
