//! Session event system for rendering notifications.
//!
//! The session never renders anything itself. Every change to its
//! projection is announced as a [`SessionEvent`] so a rendering layer can
//! keep its own view state in step (see [`MapView`](crate::MapView)).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use trailmap_types::{CoverageMarker, LocationFix, LocationSample, ViewRegion};

/// Events emitted by a tracking session.
///
/// All events are serializable for logging, persistence, and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session began accepting fixes.
    TrackingStarted,
    /// The session stopped accepting fixes.
    TrackingStopped,
    /// A persisted sample was appended to the path.
    PathPointAdded { sample: LocationSample },
    /// A coverage marker was added.
    MarkerAdded { marker: CoverageMarker },
    /// The path and every listed marker were removed.
    ProjectionCleared { markers: Vec<CoverageMarker> },
    /// The previous path and markers were removed and replaced by these.
    ProjectionReplaced {
        path: Vec<LocationSample>,
        markers: Vec<CoverageMarker>,
    },
    /// Suggested view to frame.
    Recenter { region: ViewRegion },
    /// A fix could not be persisted and was left out of the projection.
    PersistFailed { fix: LocationFix, error: String },
    /// The projection was cleared but the store still holds history.
    StoreDiverged { error: String },
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
