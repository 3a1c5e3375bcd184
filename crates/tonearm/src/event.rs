//! Semantic playback events and their fan-out to subscribers.

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

/// Signals a player publishes about the loaded track's lifecycle. Each
/// subscriber receives them in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Total track duration, published exactly once per session, as soon as
    /// it can be derived.
    DurationChanged(Duration),
    /// Playback position advanced. Throttled to at most one event per
    /// second of track time, except immediately after a seek.
    PositionChanged(Duration),
    /// The loaded track reached its natural end.
    TrackFinished,
    /// Playback ceased: natural track end, or a confirmed stop request.
    PlaybackFinished,
    /// The backend failed out from under us (e.g. its process exited
    /// unexpectedly). Deliberately distinct from a normal finish.
    BackendFailed(String),
}

/// Fan-out of player events to any number of subscribers. Disconnected
/// subscribers are pruned on the next broadcast.
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn broadcast(&self, event: &PlayerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_subscriber_in_order() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.broadcast(&PlayerEvent::TrackFinished);
        bus.broadcast(&PlayerEvent::PlaybackFinished);

        for rx in [a, b] {
            assert_eq!(rx.try_recv(), Ok(PlayerEvent::TrackFinished));
            assert_eq!(rx.try_recv(), Ok(PlayerEvent::PlaybackFinished));
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.broadcast(&PlayerEvent::TrackFinished);
        assert_eq!(keep.try_recv(), Ok(PlayerEvent::TrackFinished));
    }
}
