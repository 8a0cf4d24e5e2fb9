//! Render-side mirror of a session's projection.
//!
//! A rendering layer owns its own view state and updates it only from
//! [`SessionEvent`]s. [`MapView`] is that state in its simplest form: feed
//! it every event and it holds the same path and markers as the session.
//!
//! A receiver that falls behind the broadcast channel loses events. The view
//! then marks itself stale, and
//! [`TrackingSession::sync_view`](crate::TrackingSession::sync_view) rebuilds
//! it from a snapshot of the session.

use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

use trailmap_types::{CoverageMarker, GeoPoint, LocationSample, ViewRegion};

use crate::events::{EventReceiver, SessionEvent};

/// View state rebuilt purely from session notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapView {
    /// Polyline points, in recording order.
    pub path: Vec<GeoPoint>,
    /// Heat-map circles currently shown.
    pub markers: Vec<CoverageMarker>,
    /// Last suggested view.
    pub region: Option<ViewRegion>,
    /// Whether the session reported it is tracking.
    pub tracking: bool,
    /// Last persistence problem reported by the session.
    pub last_error: Option<String>,
    /// Set when events were missed; the view must be rebuilt from the session.
    pub stale: bool,
}

impl MapView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one notification.
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::TrackingStarted => self.tracking = true,
            SessionEvent::TrackingStopped => self.tracking = false,
            SessionEvent::PathPointAdded { sample } => self.path.push(sample.point()),
            SessionEvent::MarkerAdded { marker } => self.markers.push(*marker),
            SessionEvent::ProjectionCleared { markers } => {
                self.path.clear();
                self.markers.retain(|m| !markers.contains(m));
            }
            SessionEvent::ProjectionReplaced { path, markers } => {
                self.path = path.iter().map(LocationSample::point).collect();
                self.markers.clone_from(markers);
            }
            SessionEvent::Recenter { region } => self.region = Some(*region),
            SessionEvent::PersistFailed { error, .. } | SessionEvent::StoreDiverged { error } => {
                self.last_error = Some(error.clone());
            }
        }
    }

    /// Replace the path, markers and mode with a snapshot and clear `stale`.
    ///
    /// The suggested region and last error are kept.
    pub fn restore(
        &mut self,
        path: &[LocationSample],
        markers: &[CoverageMarker],
        tracking: bool,
    ) {
        self.path = path.iter().map(LocationSample::point).collect();
        self.markers = markers.to_vec();
        self.tracking = tracking;
        self.stale = false;
    }

    /// Apply every event currently queued on `rx`. Returns how many were applied.
    pub fn drain(&mut self, rx: &mut EventReceiver) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Map view missed {} session events", missed);
                    self.stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventDispatcher;

    fn marker(lat: f64) -> CoverageMarker {
        CoverageMarker {
            center: GeoPoint::new(lat, 0.0),
            radius_m: 200.0,
        }
    }

    #[test]
    fn test_apply_add_and_clear() {
        let mut view = MapView::new();
        view.apply(&SessionEvent::PathPointAdded {
            sample: LocationSample::new(1.0, 0.0).with_id(1),
        });
        view.apply(&SessionEvent::MarkerAdded { marker: marker(1.0) });
        view.apply(&SessionEvent::MarkerAdded { marker: marker(2.0) });
        assert_eq!(view.path, vec![GeoPoint::new(1.0, 0.0)]);

        view.apply(&SessionEvent::ProjectionCleared {
            markers: vec![marker(1.0), marker(2.0)],
        });

        assert!(view.path.is_empty());
        assert!(view.markers.is_empty());
    }

    #[test]
    fn test_apply_replacement() {
        let mut view = MapView::new();
        view.apply(&SessionEvent::MarkerAdded { marker: marker(9.0) });

        let path = vec![
            LocationSample::new(1.0, 0.0).with_id(1),
            LocationSample::new(2.0, 0.0).with_id(2),
        ];
        view.apply(&SessionEvent::ProjectionReplaced {
            path,
            markers: vec![marker(1.0), marker(2.0)],
        });

        assert_eq!(view.path, vec![GeoPoint::new(1.0, 0.0), GeoPoint::new(2.0, 0.0)]);
        assert_eq!(view.markers, vec![marker(1.0), marker(2.0)]);
    }

    #[test]
    fn test_restore_clears_stale() {
        let mut view = MapView {
            stale: true,
            last_error: Some("disk full".to_string()),
            ..MapView::default()
        };
        let sample = LocationSample::new(4.0, 0.0).with_id(7);

        view.restore(&[sample], &[marker(4.0)], true);

        assert!(!view.stale);
        assert!(view.tracking);
        assert_eq!(view.path, vec![GeoPoint::new(4.0, 0.0)]);
        assert_eq!(view.markers, vec![marker(4.0)]);
        assert_eq!(view.last_error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_apply_errors_and_mode() {
        let mut view = MapView::new();
        view.apply(&SessionEvent::TrackingStarted);
        assert!(view.tracking);

        view.apply(&SessionEvent::StoreDiverged {
            error: "locked".to_string(),
        });
        assert_eq!(view.last_error.as_deref(), Some("locked"));

        view.apply(&SessionEvent::TrackingStopped);
        assert!(!view.tracking);
    }

    #[test]
    fn test_drain_marks_stale_on_lag() {
        let dispatcher = EventDispatcher::new(2);
        let mut rx = dispatcher.subscribe();
        for i in 0..5 {
            dispatcher.send(SessionEvent::MarkerAdded {
                marker: marker(f64::from(i)),
            });
        }

        let mut view = MapView::new();
        let applied = view.drain(&mut rx);

        assert!(view.stale);
        assert_eq!(applied, 2);
        assert_eq!(view.markers, vec![marker(3.0), marker(4.0)]);
    }
}
