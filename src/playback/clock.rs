//! Wall-clock pacing for realtime delivery.
//! The first delivered frame anchors media time to the wall clock; later
//! frames are held back until their timestamp comes due.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::time::Time;

/// Longest single sleep, so a stop request is noticed promptly
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Maps media timestamps (nanoseconds) onto wall-clock instants
#[derive(Debug, Default)]
pub struct PacingClock {
    anchor: Option<(Instant, Time)>,
}

impl PacingClock {
    pub fn new() -> Self {
        Self { anchor: None }
    }

    /// Forget the anchor, e.g. after a seek or a loop
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Time left before a frame stamped `timestamp` is due, as seen at `now`
    pub fn delay_at(&mut self, timestamp: Time, now: Instant) -> Duration {
        let (origin, base) = *self.anchor.get_or_insert((now, timestamp));

        let due = timestamp - base;
        if due <= 0 {
            return Duration::ZERO;
        }

        let elapsed = now.saturating_duration_since(origin);
        Duration::from_nanos(due as u64).saturating_sub(elapsed)
    }

    /// Block until `timestamp` is due or `running` is cleared.
    ///
    /// Returns false if interrupted.
    pub fn wait_until(&mut self, timestamp: Time, running: &AtomicBool) -> bool {
        let mut remaining = self.delay_at(timestamp, Instant::now());

        while !remaining.is_zero() {
            if !running.load(Ordering::Acquire) {
                return false;
            }
            let slice = remaining.min(WAIT_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }

        running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::from_seconds;

    #[test]
    fn test_first_frame_is_due_immediately() {
        let mut clock = PacingClock::new();
        let now = Instant::now();
        assert_eq!(clock.delay_at(from_seconds(5.0), now), Duration::ZERO);
    }

    #[test]
    fn test_later_frames_wait_for_their_offset() {
        let mut clock = PacingClock::new();
        let start = Instant::now();
        clock.delay_at(from_seconds(5.0), start);

        let delay = clock.delay_at(from_seconds(5.5), start);
        assert_eq!(delay, Duration::from_millis(500));

        let delay = clock.delay_at(from_seconds(5.5), start + Duration::from_millis(200));
        assert_eq!(delay, Duration::from_millis(300));

        // Late frames are not delayed
        let delay = clock.delay_at(from_seconds(5.5), start + Duration::from_secs(1));
        assert_eq!(delay, Duration::ZERO);
    }

    #[test]
    fn test_frames_before_anchor_are_due() {
        let mut clock = PacingClock::new();
        let start = Instant::now();
        clock.delay_at(from_seconds(2.0), start);
        assert_eq!(clock.delay_at(from_seconds(1.0), start), Duration::ZERO);
    }

    #[test]
    fn test_reset_reanchors() {
        let mut clock = PacingClock::new();
        let start = Instant::now();
        clock.delay_at(from_seconds(10.0), start);
        clock.reset();

        // After a loop the media clock restarts at zero
        assert_eq!(clock.delay_at(0, start), Duration::ZERO);
        assert_eq!(clock.delay_at(from_seconds(0.1), start), Duration::from_millis(100));
    }

    #[test]
    fn test_wait_is_interrupted_by_stop() {
        let mut clock = PacingClock::new();
        let running = AtomicBool::new(true);
        assert!(clock.wait_until(0, &running));

        running.store(false, Ordering::Release);
        let started = Instant::now();
        assert!(!clock.wait_until(from_seconds(60.0), &running));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
