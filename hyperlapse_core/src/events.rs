//! Typed event channels.
//!
//! Each engine owns a small set of named channels instead of one broadcast
//! list. Listeners are plain closures registered per channel:
//!
//! ```ignore
//! let id = hyperlapse.events.load.subscribe(|event| match event {
//!     LoadEvent::Progress { position, total } => println!("{position}/{total}"),
//!     _ => {}
//! });
//! hyperlapse.events.load.unsubscribe(id);
//! ```

use hyperlapse_env::GeoPoint;

/// Handle returned by [`EventChannel::subscribe`].
pub type ListenerId = u64;

type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// A list of listeners for one event type.
pub struct EventChannel<E> {
    listeners: Vec<(ListenerId, Listener<E>)>,
    next_id: ListenerId,
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a listener; it is called for every later `emit`.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Delivers `event` to every listener in registration order.
    pub fn emit(&mut self, event: &E) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Route resolution and sequencing progress.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEvent {
    /// The routing service answered
    Resolved { legs: usize, distance_m: f64 },

    /// One raw sample has been resolved (or dropped)
    Progress { sample: usize, total: usize, accepted: usize },

    /// Sequencing finished with `points` panoramas
    Complete { points: usize },

    /// Sequencing stopped on a cancel request
    Canceled { points: usize },
}

/// Image loading progress.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// Imagery for `position` is now being requested
    Progress { position: usize, total: usize },

    /// Every frame has its texture
    Complete { frames: usize },

    /// Loading stopped after the frame at `position`
    Canceled { position: usize },
}

/// A frame was drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvent {
    pub position: usize,

    /// Stored heading of the panorama (degrees)
    pub heading_deg: f64,

    /// Stored pitch of the panorama (degrees)
    pub pitch_deg: f64,

    pub point: GeoPoint,
}

/// Playback state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Frame(FrameEvent),
    Play,
    Pause,
}

/// A human-readable failure report.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub message: String,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// All channels of a hyperlapse.
#[derive(Debug, Default)]
pub struct HyperlapseEvents {
    pub route: EventChannel<RouteEvent>,
    pub load: EventChannel<LoadEvent>,
    pub playback: EventChannel<PlaybackEvent>,
    pub error: EventChannel<ErrorEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_reaches_listeners_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = EventChannel::new();

        let first = Arc::clone(&log);
        channel.subscribe(move |e: &LoadEvent| first.lock().unwrap().push(("first", e.clone())));
        let second = Arc::clone(&log);
        channel.subscribe(move |e: &LoadEvent| second.lock().unwrap().push(("second", e.clone())));

        channel.emit(&LoadEvent::Complete { frames: 3 });

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "first");
        assert_eq!(log[1], ("second", LoadEvent::Complete { frames: 3 }));
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut channel = EventChannel::new();

        let counter = Arc::clone(&count);
        let id = channel.subscribe(move |_: &PlaybackEvent| *counter.lock().unwrap() += 1);

        channel.emit(&PlaybackEvent::Play);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.emit(&PlaybackEvent::Pause);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(channel.listener_count(), 0);
    }
}
