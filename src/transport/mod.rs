// Transport module - playback state machine and event dispatch
// The scheduler maps wall-clock time onto the tick timeline and fires
// registered callbacks ahead of their due time

pub mod clock;
pub mod events;
pub mod scheduler;

pub use clock::{Clock, SampleClock, SystemClock};
pub use events::{EventEmitter, EventKind, ListenerId, TransportEvent};
pub use scheduler::{EventScheduler, PlaybackState};
