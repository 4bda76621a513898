//! Time management utilities

use std::time::Duration;

/// Frame clock driven by host refresh timestamps
///
/// Timestamps come from the host's display refresh (monotonic, relative to an
/// arbitrary origin), so the clock never reads the system time itself. The
/// first advance after creation, and the first after [`FrameClock::mark_resumed`],
/// never report more than one nominal frame interval.
#[derive(Debug, Clone)]
pub struct FrameClock {
    nominal: Duration,
    last: Option<Duration>,
    elapsed: Duration,
    frame_count: u64,
    clamp_next: bool,
}

impl FrameClock {
    /// Create a clock with the given nominal frame interval
    pub fn new(nominal: Duration) -> Self {
        Self {
            nominal,
            last: None,
            elapsed: Duration::ZERO,
            frame_count: 0,
            clamp_next: false,
        }
    }

    /// Nominal frame interval
    pub fn nominal(&self) -> Duration {
        self.nominal
    }

    /// Advance to `now` and return the delta in seconds
    ///
    /// Timestamps that go backwards yield a zero delta.
    pub fn advance(&mut self, now: Duration) -> f32 {
        let raw = self
            .last
            .map_or(self.nominal, |last| now.saturating_sub(last));

        let delta = if self.clamp_next {
            self.clamp_next = false;
            raw.min(self.nominal)
        } else {
            raw
        };

        self.last = Some(now);
        self.elapsed += delta;
        self.frame_count += 1;
        delta.as_secs_f32()
    }

    /// Clamp the next delta to one nominal interval
    ///
    /// Called when ticking resumes after a pause of unknown length.
    pub fn mark_resumed(&mut self) {
        self.clamp_next = true;
    }

    /// Total scene time accumulated from deltas, in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Number of advances so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_micros(16_667);

    #[test]
    fn test_first_advance_uses_nominal_interval() {
        let mut clock = FrameClock::new(FRAME);
        let delta = clock.advance(Duration::from_secs(100));
        assert!((delta - FRAME.as_secs_f32()).abs() < 1e-6);
    }

    #[test]
    fn test_advance_reports_raw_delta() {
        let mut clock = FrameClock::new(FRAME);
        clock.advance(Duration::from_millis(0));
        let delta = clock.advance(Duration::from_millis(50));
        assert!((delta - 0.05).abs() < 1e-6);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_resume_clamps_one_delta() {
        let mut clock = FrameClock::new(FRAME);
        clock.advance(Duration::from_secs(1));
        clock.mark_resumed();
        let clamped = clock.advance(Duration::from_secs(61));
        assert!(clamped <= FRAME.as_secs_f32());

        let next = clock.advance(Duration::from_secs(61) + Duration::from_millis(40));
        assert!((next - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_backwards_timestamp_is_zero_delta() {
        let mut clock = FrameClock::new(FRAME);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.advance(Duration::from_secs(4)), 0.0);
    }
}
