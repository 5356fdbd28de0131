use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot flag whose check and set happen in a single compare-and-swap.
///
/// Used for the single-flight processing guard, the per-cycle finalize
/// latch, per-transfer reassembly and pending turn restarts.
#[derive(Debug, Default)]
pub struct Latch {
    set: AtomicBool,
}

impl Latch {
    pub const fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
        }
    }

    /// Set the latch. Returns `true` only for the caller that flipped it.
    pub fn try_set(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reset(&self) {
        self.set.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}
