use std::time::Duration;
use tokio::time::Instant;

use crate::config::DetectorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Nothing changed
    Continue,
    /// Level dropped below the threshold; silence timer armed
    SilenceStarted,
    /// Silence lasted long enough to close the utterance
    SilenceTimeoutFired,
}

/// Silence-based end-of-utterance detector.
///
/// Holds no state beyond the start of the current silence episode, so a
/// fresh detector per utterance is a full reset.
#[derive(Debug, Clone)]
pub struct EndpointDetector {
    silence_threshold: f32,
    silence_duration: Duration,
    silence_started_at: Option<Instant>,
    /// Set once the current silence episode has fired
    fired: bool,
}

impl EndpointDetector {
    pub fn new(silence_threshold: f32, silence_duration: Duration) -> Self {
        Self {
            silence_threshold,
            silence_duration,
            silence_started_at: None,
            fired: false,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.silence_threshold, config.silence_duration())
    }

    /// Feed one energy sample taken at `now`.
    pub fn observe(&mut self, energy: f32, now: Instant) -> DetectorEvent {
        if energy >= self.silence_threshold {
            // Sound cancels the pending timeout and ends the episode
            self.silence_started_at = None;
            self.fired = false;
            return DetectorEvent::Continue;
        }

        if self.fired {
            return DetectorEvent::Continue;
        }

        match self.silence_started_at {
            None => {
                self.silence_started_at = Some(now);
                DetectorEvent::SilenceStarted
            }
            Some(started) if now.saturating_duration_since(started) >= self.silence_duration => {
                self.silence_started_at = None;
                self.fired = true;
                DetectorEvent::SilenceTimeoutFired
            }
            Some(_) => DetectorEvent::Continue,
        }
    }

    /// Whether a silence timer is currently armed
    pub fn is_timing_silence(&self) -> bool {
        self.silence_started_at.is_some()
    }

    pub fn reset(&mut self) {
        self.silence_started_at = None;
        self.fired = false;
    }
}
