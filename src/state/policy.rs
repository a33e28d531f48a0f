//! Auto-reconnect policy state.

/// Bounded auto-reconnect policy with a manual-override flag.
///
/// Auto-reconnect may only fire while `enabled`, not after an explicit
/// disconnect, and while `attempts < max_attempts`. Firing increments
/// `attempts` before the attempt is made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// User toggle.
    pub enabled: bool,
    /// Attempts spent in the current disconnection episode.
    pub attempts: u32,
    /// Budget per disconnection episode.
    pub max_attempts: u32,
    /// Set by an explicit disconnect; suppresses auto-reconnect.
    pub manual_disconnect: bool,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(enabled: bool, max_attempts: u32) -> Self {
        Self {
            enabled,
            attempts: 0,
            max_attempts,
            manual_disconnect: false,
        }
    }

    /// Auto-reconnect is allowed to fire right now.
    #[must_use]
    pub const fn can_fire(&self) -> bool {
        self.enabled && !self.manual_disconnect && self.attempts < self.max_attempts
    }

    /// Consume one attempt if allowed. Returns the 1-based attempt number.
    pub fn try_fire(&mut self) -> Option<u32> {
        if !self.can_fire() {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    /// A queued attempt may still run (the budget was spent when it was queued).
    #[must_use]
    pub const fn allows_queued_attempt(&self) -> bool {
        self.enabled && !self.manual_disconnect
    }

    /// The only thing stopping another attempt is the spent budget.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.enabled && !self.manual_disconnect && self.attempts >= self.max_attempts
    }

    /// A rising edge was observed.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.manual_disconnect = false;
    }

    /// User toggle. Re-enabling starts a fresh budget.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.attempts = 0;
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(true, crate::constants::MAX_RECONNECT_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_up_to_budget() {
        let mut policy = ReconnectPolicy::new(true, 3);
        assert_eq!(policy.try_fire(), Some(1));
        assert_eq!(policy.try_fire(), Some(2));
        assert_eq!(policy.try_fire(), Some(3));
        assert_eq!(policy.try_fire(), None);
        assert!(policy.is_exhausted());
    }

    #[test]
    fn test_manual_disconnect_blocks_regardless_of_budget() {
        let mut policy = ReconnectPolicy::new(true, 3);
        policy.manual_disconnect = true;
        assert!(!policy.can_fire());
        assert_eq!(policy.try_fire(), None);
        assert_eq!(policy.attempts, 0);
        assert!(!policy.is_exhausted());
    }

    #[test]
    fn test_disabled_blocks() {
        let mut policy = ReconnectPolicy::new(false, 3);
        assert_eq!(policy.try_fire(), None);
    }

    #[test]
    fn test_reenable_resets_attempts() {
        let mut policy = ReconnectPolicy::new(true, 3);
        policy.attempts = 3;
        policy.set_enabled(false);
        assert_eq!(policy.attempts, 3);
        policy.set_enabled(true);
        assert_eq!(policy.attempts, 0);
    }

    #[test]
    fn test_on_connected_resets_episode() {
        let mut policy = ReconnectPolicy::new(true, 3);
        policy.attempts = 2;
        policy.manual_disconnect = true;
        policy.on_connected();
        assert_eq!(policy.attempts, 0);
        assert!(!policy.manual_disconnect);
    }
}
