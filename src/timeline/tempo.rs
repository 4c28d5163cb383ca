// TempoCurve - a single tempo directive
// Either an instant change or a linear ramp between two tempi

use super::{Bpm, Tick, Ticks};

/// Error raised when a tempo directive is constructed with an unusable BPM.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TempoError {
    #[error("invalid tempo {0} BPM: must be finite and positive")]
    InvalidBpm(Bpm),
}

/// A tempo directive taking effect at a tick.
///
/// An instant change holds `to` from `at` onwards. A ramp interpolates
/// linearly from `from` at `at` to `to` at `at + duration`, then holds `to`.
/// Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TempoCurve {
    at: Tick,
    to: Bpm,
    from: Bpm,
    duration: Ticks,
}

fn check_bpm(bpm: Bpm) -> Result<Bpm, TempoError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(TempoError::InvalidBpm(bpm))
    }
}

impl TempoCurve {
    /// Instant tempo change to `to` at tick `at`.
    pub fn step(at: Tick, to: Bpm) -> Result<Self, TempoError> {
        let to = check_bpm(to)?;
        Ok(Self {
            at,
            to,
            from: to,
            duration: 0,
        })
    }

    /// Linear ramp from `from` to `to` over `duration` ticks starting at `at`.
    ///
    /// A zero `duration` collapses to an instant jump to `to` at `at`,
    /// regardless of `from`, so the interpolation denominator is never zero.
    pub fn ramp(at: Tick, to: Bpm, from: Bpm, duration: Ticks) -> Result<Self, TempoError> {
        let to = check_bpm(to)?;
        let from = check_bpm(from)?;
        if duration == 0 {
            return Self::step(at, to);
        }
        Ok(Self {
            at,
            to,
            from,
            duration,
        })
    }

    /// Tick at which the directive takes effect.
    pub fn at(&self) -> Tick {
        self.at
    }

    /// Target tempo.
    pub fn to(&self) -> Bpm {
        self.to
    }

    /// Starting tempo of the ramp (equals `to` for instant changes).
    pub fn from(&self) -> Bpm {
        self.from
    }

    /// Ramp length in ticks (0 for instant changes).
    pub fn duration(&self) -> Ticks {
        self.duration
    }

    /// Instantaneous tempo at `tick`, accounting for ramping.
    ///
    /// Clamped at both ends: `from` before `at`, `to` from `at + duration`.
    pub fn value_at(&self, tick: Tick) -> Bpm {
        if tick >= self.at + self.duration {
            return self.to;
        }
        if tick <= self.at {
            return self.from;
        }
        let t = (tick - self.at) as f64 / self.duration as f64;
        self.from + (self.to - self.from) * t
    }
}

impl Default for TempoCurve {
    /// The implicit tempo active before any directive: 120 BPM from tick 0.
    fn default() -> Self {
        Self {
            at: 0,
            to: super::DEFAULT_BPM,
            from: super::DEFAULT_BPM,
            duration: 0,
        }
    }
}

impl std::fmt::Display for TempoCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.duration == 0 {
            write!(f, "{:.1} BPM @ tick {}", self.to, self.at)
        } else {
            write!(
                f,
                "{:.1} -> {:.1} BPM over ticks {}..{}",
                self.from,
                self.to,
                self.at,
                self.at + self.duration
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_holds_target() {
        let curve = TempoCurve::step(8, 140.0).unwrap();

        assert_eq!(curve.value_at(0), 140.0);
        assert_eq!(curve.value_at(8), 140.0);
        assert_eq!(curve.value_at(1000), 140.0);
        assert_eq!(curve.from(), 140.0);
        assert_eq!(curve.duration(), 0);
    }

    #[test]
    fn test_linear_ramp() {
        // 120 -> 60 over 32 ticks starting at tick 64
        let curve = TempoCurve::ramp(64, 60.0, 120.0, 32).unwrap();

        assert_eq!(curve.value_at(64), 120.0);
        // Halfway: 120 + (60 - 120) * 16/32 = 90
        assert_eq!(curve.value_at(80), 90.0);
        // Ramp end clamps to target exactly
        assert_eq!(curve.value_at(96), 60.0);
        assert_eq!(curve.value_at(200), 60.0);
    }

    #[test]
    fn test_ramp_clamps_before_start() {
        let curve = TempoCurve::ramp(16, 180.0, 90.0, 8).unwrap();
        assert_eq!(curve.value_at(0), 90.0);
        assert_eq!(curve.value_at(16), 90.0);
    }

    #[test]
    fn test_zero_duration_ramp_is_instant_jump() {
        // Differing endpoints with duration 0 resolve to an instant change
        let curve = TempoCurve::ramp(10, 60.0, 120.0, 0).unwrap();

        assert_eq!(curve.duration(), 0);
        assert_eq!(curve.from(), 60.0);
        assert_eq!(curve.value_at(9), 60.0);
        assert_eq!(curve.value_at(10), 60.0);
    }

    #[test]
    fn test_invalid_bpm_rejected() {
        assert!(matches!(
            TempoCurve::step(0, 0.0),
            Err(TempoError::InvalidBpm(_))
        ));
        assert!(TempoCurve::step(0, -120.0).is_err());
        assert!(TempoCurve::step(0, f64::NAN).is_err());
        assert!(TempoCurve::ramp(0, 120.0, f64::INFINITY, 4).is_err());
    }

    #[test]
    fn test_display() {
        let step = TempoCurve::step(0, 120.0).unwrap();
        assert_eq!(step.to_string(), "120.0 BPM @ tick 0");

        let ramp = TempoCurve::ramp(64, 60.0, 120.0, 32).unwrap();
        assert_eq!(ramp.to_string(), "120.0 -> 60.0 BPM over ticks 64..96");
    }
}
