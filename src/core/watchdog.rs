//! Duration watchdog - forces end of playback when the platform may never
//! emit a reliable "ended" signal.
//!
//! One-shot deadline at `duration * 1000 + 100` ms, polled from the session
//! update loop. Disarmed on every pause, re-armed on every start.

use std::time::{Duration, Instant};

/// Grace period added to the media duration
pub const WATCHDOG_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct Watchdog {
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for a media duration in seconds; None for unknown/non-positive
    pub fn timeout_for(duration_secs: Option<f64>) -> Option<Duration> {
        let secs = duration_secs.filter(|d| d.is_finite() && *d > 0.0)?;
        let millis = (secs * 1000.0).round() as u64;
        Some(Duration::from_millis(millis) + WATCHDOG_GRACE)
    }

    /// Arm (or re-arm) from `now`. Returns false when the duration is unusable.
    pub fn arm(&mut self, duration_secs: Option<f64>, now: Instant) -> bool {
        match Self::timeout_for(duration_secs) {
            Some(timeout) => {
                self.deadline = Some(now + timeout);
                log::debug!("Watchdog armed: {}ms", timeout.as_millis());
                true
            }
            None => {
                self.deadline = None;
                false
            }
        }
    }

    pub fn disarm(&mut self) {
        if self.deadline.take().is_some() {
            log::debug!("Watchdog disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once when the deadline has passed; clears the timer
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                log::debug!("Watchdog fired");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_formula() {
        assert_eq!(Watchdog::timeout_for(Some(2.0)), Some(Duration::from_millis(2100)));
        assert_eq!(Watchdog::timeout_for(Some(0.0)), None);
        assert_eq!(Watchdog::timeout_for(Some(f64::NAN)), None);
        assert_eq!(Watchdog::timeout_for(None), None);
    }

    #[test]
    fn test_fires_once_at_deadline() {
        let mut dog = Watchdog::new();
        let t0 = Instant::now();
        assert!(dog.arm(Some(2.0), t0));

        assert!(!dog.tick(t0 + Duration::from_millis(2099)));
        assert!(dog.tick(t0 + Duration::from_millis(2100)));
        assert!(!dog.is_armed());
        assert!(!dog.tick(t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn test_rearm_resets_deadline() {
        let mut dog = Watchdog::new();
        let t0 = Instant::now();
        dog.arm(Some(1.0), t0);
        dog.disarm();
        assert!(!dog.tick(t0 + Duration::from_secs(10)));

        let t1 = t0 + Duration::from_secs(3);
        dog.arm(Some(1.0), t1);
        assert!(!dog.tick(t1 + Duration::from_millis(1099)));
        assert!(dog.tick(t1 + Duration::from_millis(1100)));
    }

    #[test]
    fn test_unknown_duration_does_not_arm() {
        let mut dog = Watchdog::new();
        assert!(!dog.arm(None, Instant::now()));
        assert!(!dog.is_armed());
    }
}
