use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::utils::clock::Clock;

/// A restartable delay timer: every `trigger` pushes the deadline out again
/// and only the last pending trigger ever fires
#[derive(Clone)]
pub struct Debouncer {
    /// The duration to wait after the last event before triggering
    delay: Duration,
    /// When the last event occurred
    last_event: Option<Instant>,
    /// Whether we have a pending trigger
    pending: bool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("last_event", &self.last_event)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Debouncer {
    pub fn with_clock(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            last_event: None,
            pending: false,
            clock,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register that an event occurred, restarting the delay
    pub fn trigger(&mut self) {
        self.last_event = Some(self.clock.now());
        self.pending = true;
    }

    /// Check if enough time has passed to execute the debounced action.
    /// Returns true at most once per pending trigger.
    pub fn should_execute(&mut self) -> bool {
        if !self.pending {
            return false;
        }

        if let Some(last) = self.last_event {
            if self.clock.now().saturating_duration_since(last) >= self.delay {
                self.pending = false;
                self.last_event = None;
                return true;
            }
        }
        false
    }

    /// Get the time remaining before the action will trigger
    /// Returns None if no action is pending
    pub fn time_remaining(&self) -> Option<Duration> {
        if !self.pending {
            return None;
        }

        self.last_event.map(|last| {
            let elapsed = self.clock.now().saturating_duration_since(last);
            self.delay.saturating_sub(elapsed)
        })
    }

    /// Reset the debouncer, canceling any pending action
    pub fn reset(&mut self) {
        self.last_event = None;
        self.pending = false;
    }

    /// Check if there's a pending action
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn debouncer(ms: u64) -> (Debouncer, ManualClock) {
        let clock = ManualClock::new();
        let debouncer = Debouncer::with_clock(Duration::from_millis(ms), Arc::new(clock.clone()));
        (debouncer, clock)
    }

    #[test]
    fn test_fires_after_delay() {
        let (mut debouncer, clock) = debouncer(250);
        debouncer.trigger();

        clock.advance_ms(249);
        assert!(!debouncer.should_execute());

        clock.advance_ms(1);
        assert!(debouncer.should_execute());
        // Only once
        assert!(!debouncer.should_execute());
    }

    #[test]
    fn test_each_trigger_restarts_delay() {
        let (mut debouncer, clock) = debouncer(250);
        debouncer.trigger();
        clock.advance_ms(200);
        debouncer.trigger();
        clock.advance_ms(200);
        assert!(!debouncer.should_execute());
        assert_eq!(debouncer.time_remaining(), Some(Duration::from_millis(50)));

        clock.advance_ms(50);
        assert!(debouncer.should_execute());
    }

    #[test]
    fn test_reset_cancels_pending() {
        let (mut debouncer, clock) = debouncer(100);
        debouncer.trigger();
        debouncer.reset();
        clock.advance_ms(500);
        assert!(!debouncer.should_execute());
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.time_remaining(), None);
    }
}
