// Timeline module - musical time representation
// Tempo directives and the precomputed tick -> wall-clock offset table

pub mod table;
pub mod tempo;

pub use table::TickOffsetTable;
pub use tempo::{TempoCurve, TempoError};

/// Smallest addressable unit of the timeline.
pub type Tick = u64;

/// A span measured in ticks.
pub type Ticks = u64;

/// Wall-clock time in seconds.
pub type Seconds = f64;

/// Tempo in beats (quarter notes) per minute.
pub type Bpm = f64;

/// Implicit tempo active before the first directive.
pub const DEFAULT_BPM: Bpm = 120.0;
