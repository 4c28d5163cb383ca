// Clock sources for the scheduler
// The engine never owns time; it reads a monotonic clock injected at
// construction and maps elapsed seconds onto the tick timeline

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::timeline::Seconds;

/// Monotonically increasing wall-clock reading in seconds.
///
/// Implementations must never go backwards while a scheduler is playing.
pub trait Clock {
    /// Current time in seconds since an arbitrary fixed origin.
    fn now(&self) -> Seconds;
}

/// Real-time clock backed by `std::time::Instant`.
///
/// Time starts at 0.0 when the clock is created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Seconds {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock driven by an audio callback's sample counter.
///
/// The audio thread advances the counter by the number of frames it renders;
/// any other thread reads the elapsed time as `samples / sample_rate`.
/// Cloning shares the underlying counter, so one handle lives in the audio
/// callback and another inside the scheduler. Also usable as a
/// hand-advanced clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct SampleClock {
    /// Current sample position (incremented by the audio callback)
    position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            position: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Advance the counter by `frames` samples (called from the audio callback).
    pub fn advance(&self, frames: usize) {
        self.position.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Current sample position.
    pub fn current_sample(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Sample rate used for the seconds conversion.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Clock for SampleClock {
    fn now(&self) -> Seconds {
        self.current_sample() as f64 / self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(a >= 0.0);
        assert!(b >= a);
    }

    #[test]
    fn test_sample_clock_advance() {
        let clock = SampleClock::new(48000.0);
        assert_eq!(clock.now(), 0.0);

        // 1 second = 48000 samples
        clock.advance(48000);
        assert_eq!(clock.current_sample(), 48000);
        assert_eq!(clock.now(), 1.0);

        // 10ms = 480 samples
        clock.advance(480);
        assert!((clock.now() - 1.01).abs() < 1e-12);
    }

    #[test]
    fn test_sample_clock_shared_handle() {
        let clock = SampleClock::new(1000.0);
        let handle = clock.clone();

        handle.advance(500);
        assert_eq!(clock.now(), 0.5);
        assert_eq!(handle.now(), 0.5);
    }
}
