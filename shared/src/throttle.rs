/// Delay between a pan/zoom event and the visible-marker recomputation.
pub const THROTTLE_DELAY_MS: u32 = 100;

/// Leading-edge throttle. At most one recomputation is pending; triggers
/// that arrive meanwhile are dropped, not queued.
#[derive(Debug, Default)]
pub struct ThrottleGate {
    pending: bool,
    dropped: u64,
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the caller should schedule the work.
    pub fn trigger(&mut self) -> bool {
        if self.pending {
            self.dropped += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Called by the scheduled work when it runs. Returns `false` if nothing
    /// was pending.
    pub fn fire(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_triggers_are_dropped() {
        let mut gate = ThrottleGate::new();
        assert!(gate.trigger());
        assert!(!gate.trigger());
        assert!(!gate.trigger());
        assert!(gate.is_pending());
        assert_eq!(gate.dropped(), 2);

        assert!(gate.fire());
        assert!(!gate.is_pending());
        assert!(!gate.fire());

        assert!(gate.trigger());
        assert_eq!(gate.dropped(), 2);
    }
}
