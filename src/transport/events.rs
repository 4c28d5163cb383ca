// Transport events - minimal publish/subscribe
// Synchronous listeners for same-thread consumers, plus lock-free ring
// buffer taps for consumers on other threads

use std::collections::HashMap;

use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::timeline::Tick;

/// Lifecycle and position notifications published by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Playback began (not published by silent restarts during seek).
    Start,
    /// Playback halted (paused or stopped).
    Stop,
    /// The current tick changed; published on every mutation, never silenced.
    Tick(Tick),
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Start => EventKind::Start,
            TransportEvent::Stop => EventKind::Stop,
            TransportEvent::Tick(_) => EventKind::Tick,
        }
    }
}

/// Event category a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stop,
    Tick,
}

/// Handle identifying one subscription; pass it back to unsubscribe.
///
/// Each subscription is a distinct registration, so a listener can never be
/// invoked twice for one published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(TransportEvent) + Send>;

/// Publish/subscribe registry for transport events.
///
/// Dispatch is synchronous and in no guaranteed order.
pub struct EventEmitter {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    taps: Vec<HeapProd<TransportEvent>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: HashMap::new(),
            taps: Vec::new(),
        }
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(TransportEvent) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove the subscription identified by `id`.
    ///
    /// Returns true if a listener was removed.
    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        match self.listeners.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(listener_id, _)| *listener_id != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Create a lock-free tap receiving every published event.
    ///
    /// The consumer half may live on another thread. Events pushed into a
    /// full tap are dropped, never blocked on.
    pub fn stream(&mut self, capacity: usize) -> HeapCons<TransportEvent> {
        let rb = HeapRb::<TransportEvent>::new(capacity);
        let (producer, consumer) = rb.split();
        self.taps.push(producer);
        consumer
    }

    /// Publish `event` to all matching listeners and all taps.
    pub fn emit(&mut self, event: TransportEvent) {
        if let Some(list) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in list.iter_mut() {
                listener(event);
            }
        }
        for tap in self.taps.iter_mut() {
            let _ = tap.try_push(event);
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("next_id", &self.next_id)
            .field(
                "listeners",
                &self
                    .listeners
                    .iter()
                    .map(|(kind, list)| (*kind, list.len()))
                    .collect::<HashMap<_, _>>(),
            )
            .field("taps", &self.taps.len())
            .finish()
    }
}
