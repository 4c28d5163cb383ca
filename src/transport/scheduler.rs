// EventScheduler - the playback state machine
// Holds the tempo directives, the offset table and the callback registry,
// and runs the lookahead pass that turns playback state into timed dispatch

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use ringbuf::HeapCons;

use super::clock::Clock;
use super::events::{EventEmitter, EventKind, ListenerId, TransportEvent};
use crate::timeline::{Bpm, Seconds, TempoCurve, TempoError, Tick, TickOffsetTable, Ticks};

/// How far ahead of real time the pass dispatches due callbacks.
const LOOKAHEAD_WINDOW: Seconds = 0.5;

/// Delay between passes while playing. Must stay well below the lookahead
/// window so no tick is discovered too late to dispatch before its due time.
const PASS_INTERVAL: Duration = Duration::from_millis(25);

/// Playback state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PlaybackState::Stopped)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Stopped
    }
}

/// Payload callback fired when playback reaches its tick.
///
/// Invoked as `(start_time, stop_time)`: the absolute wall-clock second at
/// which the event starts, and the absolute second at which it ends. The
/// span between them is the event's tick duration resolved against the
/// offset table at dispatch time.
pub type Callback = Box<dyn FnMut(Seconds, Seconds) + Send>;

/// A registered event: inert data until playback reaches its tick.
struct EventEntry {
    duration: Ticks,
    callback: Callback,
}

/// Schedules events along a tempo-variable tick timeline.
///
/// The scheduler owns the tempo directive map, the callback registry and
/// the precomputed offset table; the clock is injected at construction and
/// only ever read. All mutation happens on one logical thread of control:
/// direct calls by the caller plus [`pump`](Self::pump) passes driven by a
/// host timer.
pub struct EventScheduler<C: Clock> {
    clock: C,

    /// Tempo directives keyed by the tick they take effect at.
    /// One directive per tick; a later schedule at the same tick replaces it.
    tempo_events: BTreeMap<Tick, TempoCurve>,

    /// Registered callbacks grouped by starting tick.
    callback_events: HashMap<Tick, Vec<EventEntry>>,

    table: TickOffsetTable,

    tick: Tick,
    subdivisions: u32,
    length: Ticks,

    state: PlaybackState,

    /// Wall-clock time at which tick 0 would have occurred.
    play_start: Seconds,

    /// Ticks already dispatched in the current play run.
    /// Cleared on every pause/stop.
    dispatched: HashSet<Tick>,

    emitter: EventEmitter,
}

impl<C: Clock> EventScheduler<C> {
    /// Create a scheduler reading time from `clock`.
    ///
    /// Defaults: 16 subdivisions per quarter beat, 32-tick timeline,
    /// implicit 120 BPM.
    pub fn new(clock: C) -> Self {
        let subdivisions = 16;
        let length = 32;
        let tempo_events = BTreeMap::new();
        let table = TickOffsetTable::rebuild(&tempo_events, length, subdivisions);

        Self {
            clock,
            tempo_events,
            callback_events: HashMap::new(),
            table,
            tick: 0,
            subdivisions,
            length,
            state: PlaybackState::Stopped,
            play_start: 0.0,
            dispatched: HashSet::new(),
            emitter: EventEmitter::new(),
        }
    }

    /// Current tick position.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Reposition the transport.
    ///
    /// Clamped to the timeline length. Every mutation publishes a
    /// [`TransportEvent::Tick`] with the new value; this is the single
    /// channel listeners use to track position and is never silenced.
    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick.min(self.length);
        self.emitter.emit(TransportEvent::Tick(self.tick));
    }

    /// Ticks per quarter beat.
    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    /// Change the tick resolution.
    ///
    /// Does not itself rebuild the offset table; offsets rebuild on the
    /// next tempo or length change. Callers changing subdivisions mid-use
    /// must re-derive dependent schedules.
    pub fn set_subdivisions(&mut self, subdivisions: u32) {
        assert!(subdivisions > 0, "subdivisions must be > 0");
        self.subdivisions = subdivisions;
    }

    /// Total timeline duration in ticks; `tick == length` is the terminal position.
    pub fn length(&self) -> Ticks {
        self.length
    }

    /// Resize the timeline and rebuild the offset table.
    pub fn set_length(&mut self, length: Ticks) {
        self.length = length;
        self.rebuild();
        if self.tick > length {
            self.set_tick(length);
        }
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Total timeline duration in seconds at the current tempo map.
    pub fn total_duration(&self) -> Seconds {
        self.table.total_duration()
    }

    fn rebuild(&mut self) {
        self.table = TickOffsetTable::rebuild(&self.tempo_events, self.length, self.subdivisions);
    }

    /// Schedule an instant tempo change at `tick`.
    ///
    /// Replaces any directive already at that tick and rebuilds the table.
    pub fn schedule_tempo_change(&mut self, tick: Tick, to: Bpm) -> Result<(), TempoError> {
        let curve = TempoCurve::step(tick, to)?;
        self.tempo_events.insert(tick, curve);
        self.rebuild();
        Ok(())
    }

    /// Schedule a tempo ramp from `from` to `to` over `duration` ticks at `tick`.
    ///
    /// Replaces any directive already at that tick and rebuilds the table.
    pub fn schedule_tempo_ramp(
        &mut self,
        tick: Tick,
        to: Bpm,
        from: Bpm,
        duration: Ticks,
    ) -> Result<(), TempoError> {
        let curve = TempoCurve::ramp(tick, to, from, duration)?;
        self.tempo_events.insert(tick, curve);
        self.rebuild();
        Ok(())
    }

    /// Register `callback` to fire when playback reaches `tick`.
    ///
    /// Multiple entries at the same tick are independent and all fire. The
    /// duration stays in ticks and is resolved against the offset table at
    /// dispatch time, so tempo changes scheduled later still apply.
    /// Entries beyond the timeline length are stored but never reached.
    pub fn schedule_event<F>(&mut self, tick: Tick, duration: Ticks, callback: F)
    where
        F: FnMut(Seconds, Seconds) + Send + 'static,
    {
        self.callback_events
            .entry(tick)
            .or_default()
            .push(EventEntry {
                duration,
                callback: Box::new(callback),
            });
    }

    /// Drop all tempo directives and registered callbacks.
    pub fn clear(&mut self) {
        self.tempo_events.clear();
        self.callback_events.clear();
        self.dispatched.clear();
        self.rebuild();
        log::debug!("scheduler cleared");
    }

    /// Reposition the transport without interrupting the audible lifecycle.
    ///
    /// While playing this silently pauses, repositions and silently
    /// restarts, so listeners see exactly one `Tick` and no `Start`/`Stop`
    /// pair. Otherwise it simply repositions (one `Tick`).
    pub fn seek(&mut self, tick: Tick) {
        log::debug!("seek to tick {}", tick);
        if self.state.is_playing() {
            self.pause_inner(true);
            self.set_tick(tick);
            self.start_inner(true);
        } else {
            self.set_tick(tick);
        }
    }

    /// Begin playback from the current tick.
    ///
    /// A no-op at the terminal tick. Publishes `Start`, computes the
    /// play-start reference so that tick 0 maps to
    /// `now - offset(current tick)`, and runs the first lookahead pass.
    /// The host then drives subsequent passes via [`pump`](Self::pump).
    pub fn start(&mut self) {
        self.start_inner(false);
    }

    fn start_inner(&mut self, silent: bool) {
        if self.tick == self.length {
            return;
        }

        if !silent {
            self.emitter.emit(TransportEvent::Start);
        }
        log::debug!("transport start at tick {}", self.tick);

        self.state = PlaybackState::Playing;
        // Where tick 0 would have been on the wall clock
        self.play_start = self.clock.now() - self.table.offset(self.tick);

        self.pump();
    }

    /// Halt playback keeping the current tick.
    ///
    /// Publishes `Stop` and clears the dispatched-tick bookkeeping so a
    /// subsequent start re-evaluates dispatch from the current tick
    /// forward. Safe to call repeatedly.
    pub fn pause(&mut self) {
        self.pause_inner(false);
    }

    fn pause_inner(&mut self, silent: bool) {
        if !silent {
            self.emitter.emit(TransportEvent::Stop);
        }
        if self.state.is_playing() {
            log::debug!("transport paused at tick {}", self.tick);
            self.state = PlaybackState::Paused;
        }
        self.dispatched.clear();
    }

    /// Halt playback and rewind to tick 0.
    ///
    /// Publishes `Stop`, then a `Tick(0)` from the rewind. Always leaves
    /// the scheduler `Stopped` at tick 0, regardless of prior state.
    pub fn stop(&mut self) {
        self.pause_inner(false);
        self.state = PlaybackState::Stopped;
        self.set_tick(0);
    }

    /// Run one lookahead pass.
    ///
    /// Derives the current tick from elapsed wall-clock time, publishes the
    /// position change, pauses at the terminal tick, and dispatches every
    /// not-yet-dispatched tick whose offset falls inside the lookahead
    /// window. Returns the delay before the next pass while still playing;
    /// `None` once playback has ended. The host timing facility owns the
    /// rescheduling: suspension happens only between passes.
    pub fn pump(&mut self) -> Option<Duration> {
        if !self.state.is_playing() {
            return None;
        }

        let elapsed = (self.clock.now() - self.play_start).max(0.0);

        let derived = self.table.tick_at(elapsed);
        if derived != self.tick {
            self.set_tick(derived);
        }

        // Reaching the end pauses before the dispatched set is cleared and
        // the scan below could re-fire terminal-tick entries.
        if self.tick == self.length {
            self.pause_inner(false);
            return None;
        }

        let horizon = elapsed + LOOKAHEAD_WINDOW;
        for tick in self.tick..=self.length {
            if self.table.offset(tick) >= horizon {
                break;
            }
            if !self.dispatched.insert(tick) {
                continue;
            }

            let when = self.play_start + self.table.offset(tick);
            if let Some(entries) = self.callback_events.get_mut(&tick) {
                for entry in entries.iter_mut() {
                    // Tick durations resolve to seconds only now, so tempo
                    // edits made after registration still apply
                    let span = self.table.span(tick, entry.duration);
                    (entry.callback)(when, when + span);
                }
            }
        }

        Some(PASS_INTERVAL)
    }

    /// Blocking convenience driver for real-time clocks.
    ///
    /// Starts playback, then sleeps and pumps until the timeline ends or
    /// something else halts the transport.
    pub fn run_to_end(&mut self) {
        self.start();
        while self.state.is_playing() {
            std::thread::sleep(PASS_INTERVAL);
            self.pump();
        }
    }

    /// Register a synchronous listener for lifecycle/position events.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(TransportEvent) + Send + 'static,
    {
        self.emitter.subscribe(kind, listener)
    }

    /// Remove a listener previously registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.emitter.unsubscribe(kind, id)
    }

    /// Create a lock-free tap receiving every published event, for
    /// consumers on other threads.
    pub fn event_stream(&mut self, capacity: usize) -> HeapCons<TransportEvent> {
        self.emitter.stream(capacity)
    }
}
