// Tickline - sample-accurate event scheduling on a tempo-variable timeline
//
// A caller declares a fixed-resolution sequence of ticks, attaches tempo
// changes (instant or ramped) and payload callbacks, then plays, pauses,
// seeks and stops while callbacks fire at the correct real-world time.

pub mod timeline;
pub mod transport;

// Re-export commonly used types for convenience
pub use timeline::{Bpm, Seconds, TempoCurve, TempoError, Tick, TickOffsetTable, Ticks};
pub use transport::{
    Clock, EventKind, EventScheduler, ListenerId, PlaybackState, SampleClock, SystemClock,
    TransportEvent,
};
