use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::latch::Latch;
use crate::session::LanguagePair;

/// What a playback completion did to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnDecision {
    /// Roles swapped; a capture restart is scheduled after the settle delay
    Swapped(LanguagePair),
    /// Duplicate completion, restart already pending, or auto-restart halted
    Ignored,
}

/// Swaps speaker roles after each playback and schedules the next capture.
///
/// One swap per completed playback. The restart itself is performed by the
/// owner when the scheduled signal arrives on the restart channel; it must
/// report back through `restart_finished`.
pub struct TurnTakingController {
    settle_delay: Duration,
    restart_tx: mpsc::Sender<()>,
    pending: Latch,
    halted: Latch,
    last_playback: Option<String>,
}

impl TurnTakingController {
    pub fn new(settle_delay: Duration, restart_tx: mpsc::Sender<()>) -> Self {
        Self {
            settle_delay,
            restart_tx,
            pending: Latch::new(),
            halted: Latch::new(),
            last_playback: None,
        }
    }

    pub fn on_playback_complete(&mut self, playback_id: &str, languages: &LanguagePair) -> TurnDecision {
        if self.halted.is_set() {
            debug!("Playback {} ended while auto-restart is halted", playback_id);
            return TurnDecision::Ignored;
        }

        if self.last_playback.as_deref() == Some(playback_id) {
            debug!("Duplicate completion for playback {}", playback_id);
            return TurnDecision::Ignored;
        }

        if !self.pending.try_set() {
            debug!("Restart already pending, ignoring completion of {}", playback_id);
            return TurnDecision::Ignored;
        }

        self.last_playback = Some(playback_id.to_string());
        let next = languages.swapped();
        info!("Turn over: {} → {}", next.source, next.target);

        let restart_tx = self.restart_tx.clone();
        let settle_delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(settle_delay).await;
            let _ = restart_tx.send(()).await;
        });

        TurnDecision::Swapped(next)
    }

    /// Outcome of the capture start triggered by the restart signal.
    ///
    /// A failure halts automatic restarts until `resume()`.
    pub fn restart_finished(&self, result: &Result<()>) {
        self.pending.reset();
        if let Err(e) = result {
            error!("Capture restart failed, halting turn-taking: {}", e);
            self.halted.try_set();
        }
    }

    /// Re-enable automatic restarts after a manual start
    pub fn resume(&self) {
        self.halted.reset();
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_set()
    }

    pub fn is_restart_pending(&self) -> bool {
        self.pending.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;

    fn en_es() -> LanguagePair {
        LanguagePair::new("en", "es")
    }

    #[tokio::test]
    async fn test_swap_and_scheduled_restart() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut turn = TurnTakingController::new(Duration::from_millis(10), tx);

        let decision = turn.on_playback_complete("p-1", &en_es());
        assert_eq!(decision, TurnDecision::Swapped(LanguagePair::new("es", "en")));
        assert!(turn.is_restart_pending());

        assert_eq!(rx.recv().await, Some(()));
        turn.restart_finished(&Ok(()));
        assert!(!turn.is_restart_pending());
    }

    #[tokio::test]
    async fn test_duplicate_completion_swaps_once() {
        let (tx, _rx) = mpsc::channel(4);
        let mut turn = TurnTakingController::new(Duration::from_millis(10), tx);

        assert!(matches!(turn.on_playback_complete("p-1", &en_es()), TurnDecision::Swapped(_)));
        assert_eq!(turn.on_playback_complete("p-1", &en_es()), TurnDecision::Ignored);

        turn.restart_finished(&Ok(()));
        assert_eq!(turn.on_playback_complete("p-1", &en_es()), TurnDecision::Ignored);
    }

    #[tokio::test]
    async fn test_completion_while_restart_pending_is_ignored() {
        let (tx, _rx) = mpsc::channel(4);
        let mut turn = TurnTakingController::new(Duration::from_secs(10), tx);

        assert!(matches!(turn.on_playback_complete("p-1", &en_es()), TurnDecision::Swapped(_)));
        assert_eq!(turn.on_playback_complete("p-2", &en_es()), TurnDecision::Ignored);
    }

    #[tokio::test]
    async fn test_failed_restart_halts() {
        let (tx, _rx) = mpsc::channel(4);
        let mut turn = TurnTakingController::new(Duration::from_millis(1), tx);

        turn.on_playback_complete("p-1", &en_es());
        turn.restart_finished(&Err(RelayError::CaptureFailure("no microphone".into())));
        assert!(turn.is_halted());
        assert_eq!(turn.on_playback_complete("p-2", &en_es()), TurnDecision::Ignored);

        turn.resume();
        assert!(matches!(turn.on_playback_complete("p-2", &en_es()), TurnDecision::Swapped(_)));
    }
}
