// TickOffsetTable - precomputed tick -> wall-clock offsets
// Rebuilt in full whenever tempo directives, length or subdivisions change

use std::collections::BTreeMap;

use super::{Seconds, TempoCurve, Tick, Ticks};

/// Offsets are rounded to 4 fractional digits so rebuilds are reproducible.
/// This is a precision contract, not an implementation detail.
const OFFSET_PRECISION: f64 = 10_000.0;

fn round_offset(seconds: Seconds) -> Seconds {
    (seconds * OFFSET_PRECISION).round() / OFFSET_PRECISION
}

/// Cumulative wall-clock offset of every tick from tick 0.
///
/// `offsets[t]` is the time in seconds at which tick `t` starts; the table
/// spans `0..=length` so the terminal position has a defined offset.
/// Monotonically non-decreasing. A single directive can shift every
/// downstream offset, so edits trigger a full recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOffsetTable {
    offsets: Vec<Seconds>,
}

impl TickOffsetTable {
    /// Build the table for `directives` over a `length`-tick timeline.
    ///
    /// Walks ticks in order with an implicit 120 BPM default active before
    /// tick 0. A directive at the walked tick becomes the active curve for
    /// all subsequent ticks until superseded. Each tick advances the running
    /// accumulator by `60 / bpm / subdivisions` seconds. O(length).
    pub fn rebuild(
        directives: &BTreeMap<Tick, TempoCurve>,
        length: Ticks,
        subdivisions: u32,
    ) -> Self {
        debug_assert!(subdivisions > 0, "subdivisions must be > 0");

        // Implicit default tempo before any directive
        let default = TempoCurve::default();
        let mut active = &default;

        let mut offsets = Vec::with_capacity(length as usize + 1);
        let mut current_time: Seconds = 0.0;

        for tick in 0..=length {
            if let Some(curve) = directives.get(&tick) {
                active = curve;
            }

            offsets.push(current_time);

            let bpm = active.value_at(tick);
            current_time = round_offset(current_time + 60.0 / bpm / subdivisions as f64);
        }

        log::debug!(
            "rebuilt offset table: {} ticks, {} directives, {:.4}s total",
            length,
            directives.len(),
            offsets.last().copied().unwrap_or(0.0)
        );

        Self { offsets }
    }

    /// Highest tick index in the table (the terminal position).
    pub fn length(&self) -> Ticks {
        self.offsets.len() as Ticks - 1
    }

    /// Offset in seconds of the start of `tick`.
    ///
    /// Panics if `tick` is beyond the timeline length; asking for an
    /// out-of-range offset is a programming error, not a runtime condition.
    pub fn offset(&self, tick: Tick) -> Seconds {
        self.offsets[tick as usize]
    }

    /// Offset of the terminal position, i.e. the total timeline duration.
    pub fn total_duration(&self) -> Seconds {
        *self.offsets.last().expect("table spans at least tick 0")
    }

    /// Tick the playhead is in at `position` seconds from tick 0.
    ///
    /// Returns the highest tick whose offset is <= `position`, or the
    /// terminal tick once `position` passes the final offset.
    pub fn tick_at(&self, position: Seconds) -> Tick {
        if position <= 0.0 {
            return 0;
        }
        let after = self.offsets.partition_point(|&offset| offset <= position);
        // offsets[0] == 0.0 <= position, so after >= 1
        after as Tick - 1
    }

    /// Wall-clock span of `duration` ticks starting at `tick`.
    ///
    /// The end index is clamped to the terminal position, so a duration
    /// crossing the end of the timeline is truncated at the final offset.
    pub fn span(&self, tick: Tick, duration: Ticks) -> Seconds {
        let end = (tick + duration).min(self.length());
        self.offset(end) - self.offset(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TempoCurve;

    fn directives(curves: &[TempoCurve]) -> BTreeMap<Tick, TempoCurve> {
        curves.iter().map(|c| (c.at(), *c)).collect()
    }

    #[test]
    fn test_default_tempo_offsets() {
        // 120 BPM, 4 subdivisions: one tick = 60/120/4 = 0.125s exactly,
        // which survives 4-digit rounding with no accumulation error.
        let table = TickOffsetTable::rebuild(&BTreeMap::new(), 16, 4);

        assert_eq!(table.length(), 16);
        assert_eq!(table.offset(0), 0.0);
        assert_eq!(table.offset(1), 0.125);
        assert_eq!(table.offset(8), 1.0);
        assert_eq!(table.offset(16), 2.0);
        assert_eq!(table.total_duration(), 2.0);
    }

    #[test]
    fn test_rounding_contract() {
        // 120 BPM, 16 subdivisions: one tick = 0.03125s, which rounds to
        // 0.0313 at 4 digits. The accumulator is rounded every step.
        let table = TickOffsetTable::rebuild(&BTreeMap::new(), 8, 16);

        assert_eq!(table.offset(0), 0.0);
        assert_eq!(table.offset(1), 0.0313);

        // Every offset is exactly the rounded recurrence, not the ideal sum
        let mut expected = 0.0;
        for tick in 0..=8 {
            assert_eq!(table.offset(tick), expected);
            expected = round_offset(expected + 0.03125);
        }

        // Rounding drift stays within half a unit in the last place per tick
        assert!((table.offset(8) - 8.0 * 0.03125).abs() <= 8.0 * 0.5e-4);
    }

    #[test]
    fn test_offsets_non_decreasing() {
        let set = directives(&[
            TempoCurve::step(0, 120.0).unwrap(),
            TempoCurve::ramp(64, 60.0, 120.0, 32).unwrap(),
            TempoCurve::step(96, 120.0).unwrap(),
        ]);
        let table = TickOffsetTable::rebuild(&set, 128, 16);

        assert_eq!(table.offset(0), 0.0);
        for tick in 1..=128 {
            assert!(table.offset(tick) >= table.offset(tick - 1));
        }
    }

    #[test]
    fn test_directive_changes_step_size() {
        // 120 BPM for ticks 0..4, then 60 BPM: tick duration doubles
        // from 0.125s to 0.25s at 4 subdivisions.
        let set = directives(&[TempoCurve::step(4, 60.0).unwrap()]);
        let table = TickOffsetTable::rebuild(&set, 8, 4);

        assert_eq!(table.offset(4), 0.5);
        assert_eq!(table.offset(5), 0.75);
        assert_eq!(table.offset(8), 1.5);
    }

    #[test]
    fn test_ramp_slows_offsets_gradually() {
        // Ramp 120 -> 60 over 32 ticks from tick 64, back to 120 at 96
        let set = directives(&[
            TempoCurve::step(0, 120.0).unwrap(),
            TempoCurve::ramp(64, 60.0, 120.0, 32).unwrap(),
            TempoCurve::step(96, 120.0).unwrap(),
        ]);
        let table = TickOffsetTable::rebuild(&set, 128, 16);

        // Constant 120 region: steps of round4(0.03125) = 0.0313
        let step_120 = table.offset(1) - table.offset(0);
        assert_eq!(step_120, 0.0313);

        // Mid-ramp (tick 80, 90 BPM): 60/90/16 = 0.041666.. per tick
        let step_mid = table.offset(81) - table.offset(80);
        assert!((step_mid - 60.0 / 90.0 / 16.0).abs() < 2e-4);

        // Just before tick 96 the ramp is near 60 BPM: ~0.0625 per tick
        let step_slow = table.offset(96) - table.offset(95);
        assert!(step_slow > step_120);

        // At tick 96 the directive jumps back to 120
        let step_back = table.offset(97) - table.offset(96);
        assert!((step_back - 0.03125).abs() < 1e-4);
    }

    #[test]
    fn test_tick_at() {
        let table = TickOffsetTable::rebuild(&BTreeMap::new(), 8, 4);

        // Tick boundaries at 0.125s each
        assert_eq!(table.tick_at(0.0), 0);
        assert_eq!(table.tick_at(0.124), 0);
        assert_eq!(table.tick_at(0.125), 1);
        assert_eq!(table.tick_at(0.3), 2);
        assert_eq!(table.tick_at(0.999), 7);

        // Inside the last tick it is still the last tick
        assert_eq!(table.tick_at(0.96), 7);

        // At or past the final offset: terminal position
        assert_eq!(table.tick_at(1.0), 8);
        assert_eq!(table.tick_at(100.0), 8);

        // Clock jitter before tick 0 clamps to 0
        assert_eq!(table.tick_at(-0.01), 0);
    }

    #[test]
    fn test_span() {
        let table = TickOffsetTable::rebuild(&BTreeMap::new(), 8, 4);

        assert_eq!(table.span(0, 4), 0.5);
        assert_eq!(table.span(2, 2), 0.25);
        // Duration crossing the end is truncated at the final offset
        assert_eq!(table.span(6, 10), 0.25);
        assert_eq!(table.span(8, 4), 0.0);
    }

    #[test]
    fn test_zero_length_timeline() {
        let table = TickOffsetTable::rebuild(&BTreeMap::new(), 0, 16);

        assert_eq!(table.length(), 0);
        assert_eq!(table.offset(0), 0.0);
        assert_eq!(table.total_duration(), 0.0);
        assert_eq!(table.tick_at(5.0), 0);
    }
}
