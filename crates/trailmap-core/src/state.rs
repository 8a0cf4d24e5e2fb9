//! The session's critical section: store handle, projection and mode.
//!
//! Everything here is synchronous and runs with the session lock held, so
//! each operation is applied to the projection completely or not at all.

use tracing::{debug, info, warn};

use trailmap_store::SampleStore;
use trailmap_types::{CoverageMarker, LocationFix, LocationSample, ViewRegion};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SessionEvent};
use crate::session::{SessionOptions, TrackingState};

pub(crate) struct SessionState<S> {
    store: S,
    path: Vec<LocationSample>,
    markers: Vec<CoverageMarker>,
    mode: TrackingState,
    awaiting_first_fix: bool,
    options: SessionOptions,
    events: EventDispatcher,
}

impl<S: SampleStore> SessionState<S> {
    pub(crate) fn new(store: S, options: SessionOptions, events: EventDispatcher) -> Self {
        Self {
            store,
            path: Vec::new(),
            markers: Vec::new(),
            mode: TrackingState::Idle,
            awaiting_first_fix: false,
            options,
            events,
        }
    }

    pub(crate) fn mode(&self) -> TrackingState {
        self.mode
    }

    pub(crate) fn path(&self) -> &[LocationSample] {
        &self.path
    }

    pub(crate) fn markers(&self) -> &[CoverageMarker] {
        &self.markers
    }

    pub(crate) fn begin_tracking(&mut self) -> Result<()> {
        if self.mode != TrackingState::Idle {
            return Err(Error::invalid_state("start", self.mode));
        }
        self.mode = TrackingState::Tracking;
        self.awaiting_first_fix = true;
        self.events.send(SessionEvent::TrackingStarted);
        Ok(())
    }

    /// Returns whether the session was tracking.
    pub(crate) fn end_tracking(&mut self) -> bool {
        if self.mode != TrackingState::Tracking {
            return false;
        }
        self.mode = TrackingState::Idle;
        self.awaiting_first_fix = false;
        self.events.send(SessionEvent::TrackingStopped);
        true
    }

    /// Persist one fix and extend the projection with it.
    ///
    /// On a failed save the projection is left exactly as it was and the
    /// session keeps tracking.
    pub(crate) fn record_fix(&mut self, fix: LocationFix) -> Result<LocationSample> {
        if self.mode != TrackingState::Tracking {
            return Err(Error::invalid_state("record a fix", self.mode));
        }

        let sample = match self.store.save(&LocationSample::from(fix)) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    "Failed to persist fix ({}, {}): {}",
                    fix.latitude, fix.longitude, e
                );
                self.events.send(SessionEvent::PersistFailed {
                    fix,
                    error: e.to_string(),
                });
                return Err(Error::Storage(e));
            }
        };

        let marker = CoverageMarker::for_sample(&sample, self.options.marker_radius_m);
        self.path.push(sample);
        self.markers.push(marker);
        debug!("Recorded {} ({} points)", sample, self.path.len());

        self.events.send(SessionEvent::PathPointAdded { sample });
        self.events.send(SessionEvent::MarkerAdded { marker });

        if self.awaiting_first_fix || self.options.recenter_on_every_fix {
            self.awaiting_first_fix = false;
            self.events.send(SessionEvent::Recenter {
                region: ViewRegion::new(sample.point(), self.options.follow_radius_m),
            });
        }

        Ok(sample)
    }

    /// Clear the projection, then the store.
    ///
    /// The projection stays cleared even if the store fails.
    pub(crate) fn reset(&mut self) -> Result<()> {
        let previous = self.mode;
        self.mode = TrackingState::Clearing;

        self.clear_projection();
        let result = self.store.clear_all();

        self.mode = previous;
        if previous == TrackingState::Tracking {
            self.awaiting_first_fix = true;
        }

        match result {
            Ok(()) => {
                info!("Location history reset");
                Ok(())
            }
            Err(e) => {
                warn!("Projection cleared but store clear failed: {}", e);
                self.events.send(SessionEvent::StoreDiverged {
                    error: e.to_string(),
                });
                Err(Error::StoreDiverged(e))
            }
        }
    }

    /// Rebuild the projection from the store's full history.
    ///
    /// Returns the view framing the first stored sample, if any. On failure
    /// the current projection is kept.
    ///
    /// The new projection is announced as a single `ProjectionReplaced`
    /// event so a subscriber cannot receive part of it.
    pub(crate) fn resume(&mut self) -> Result<Option<ViewRegion>> {
        let samples = self.store.list_all()?;

        let radius_m = self.options.marker_radius_m;
        self.markers = samples
            .iter()
            .map(|sample| CoverageMarker::for_sample(sample, radius_m))
            .collect();
        self.path = samples;
        self.events.send(SessionEvent::ProjectionReplaced {
            path: self.path.clone(),
            markers: self.markers.clone(),
        });

        info!("Resumed {} stored samples", self.path.len());

        let region = self
            .path
            .first()
            .map(|first| ViewRegion::new(first.point(), self.options.overview_radius_m));
        if let Some(region) = region {
            self.events.send(SessionEvent::Recenter { region });
        }
        Ok(region)
    }

    fn clear_projection(&mut self) {
        if self.path.is_empty() && self.markers.is_empty() {
            return;
        }
        self.path.clear();
        let markers = std::mem::take(&mut self.markers);
        self.events.send(SessionEvent::ProjectionCleared { markers });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use trailmap_store::LocationStore;
    use trailmap_types::GeoPoint;

    fn tracking<S: SampleStore>(store: S) -> SessionState<S> {
        let mut state =
            SessionState::new(store, SessionOptions::default(), EventDispatcher::new(64));
        state.begin_tracking().unwrap();
        state
    }

    #[test]
    fn test_record_fix_extends_projection() {
        let mut state = tracking(LocationStore::open_in_memory().unwrap());

        let sample = state.record_fix(LocationFix::new(37.0, -122.0)).unwrap();

        assert_eq!(sample.id, 1);
        assert_eq!(state.path(), &[sample]);
        assert_eq!(state.markers().len(), 1);
        assert_eq!(state.markers()[0].center, GeoPoint::new(37.0, -122.0));
        assert_eq!(state.markers()[0].radius_m, 200.0);
    }

    #[test]
    fn test_record_fix_requires_tracking() {
        let mut state = SessionState::new(
            LocationStore::open_in_memory().unwrap(),
            SessionOptions::default(),
            EventDispatcher::default(),
        );

        let err = state.record_fix(LocationFix::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: TrackingState::Idle,
                ..
            }
        ));
        assert!(state.path().is_empty());
    }

    #[test]
    fn test_failed_save_leaves_projection_untouched() {
        let store = MockStore::new();
        let mut state = tracking(store.clone());
        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();

        store.fail_next_saves(1);
        let err = state.record_fix(LocationFix::new(2.0, 2.0)).unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(state.path().len(), 1);
        assert_eq!(state.markers().len(), 1);
        assert_eq!(state.mode(), TrackingState::Tracking);

        state.record_fix(LocationFix::new(3.0, 3.0)).unwrap();
        assert_eq!(state.path().len(), 2);
    }

    #[test]
    fn test_begin_twice_is_invalid() {
        let mut state = tracking(MockStore::new());
        let err = state.begin_tracking().unwrap_err();
        assert!(matches!(err, Error::InvalidState { operation: "start", .. }));
    }

    #[test]
    fn test_end_tracking_is_idempotent() {
        let mut state = tracking(MockStore::new());
        assert!(state.end_tracking());
        assert!(!state.end_tracking());
        assert_eq!(state.mode(), TrackingState::Idle);
    }

    #[test]
    fn test_recenter_only_on_first_fix() {
        let events = EventDispatcher::new(64);
        let mut rx = events.subscribe();
        let mut state = SessionState::new(MockStore::new(), SessionOptions::default(), events);
        state.begin_tracking().unwrap();

        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();
        state.record_fix(LocationFix::new(2.0, 2.0)).unwrap();

        let mut recenters = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::Recenter { region } = event {
                recenters.push(region);
            }
        }
        assert_eq!(recenters.len(), 1);
        assert_eq!(recenters[0].center, GeoPoint::new(1.0, 1.0));
        assert!((recenters[0].radius_miles() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_recenter_on_every_fix_option() {
        let events = EventDispatcher::new(64);
        let mut rx = events.subscribe();
        let options = SessionOptions::builder().recenter_on_every_fix(true).build();
        let mut state = SessionState::new(MockStore::new(), options, events);
        state.begin_tracking().unwrap();

        for i in 0..3 {
            state.record_fix(LocationFix::new(f64::from(i), 0.0)).unwrap();
        }

        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Recenter { .. }) {
                count += 1;
            }
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_reset_clears_projection_and_store() {
        let store = MockStore::new();
        let mut state = tracking(store.clone());
        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();

        state.reset().unwrap();

        assert!(state.path().is_empty());
        assert!(state.markers().is_empty());
        assert!(store.samples().is_empty());
        assert_eq!(state.mode(), TrackingState::Tracking);
    }

    #[test]
    fn test_reset_failure_keeps_projection_cleared() {
        let store = MockStore::new();
        let mut state = tracking(store.clone());
        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();

        store.fail_clear(true);
        let err = state.reset().unwrap_err();

        assert!(matches!(err, Error::StoreDiverged(_)));
        assert!(err.is_recoverable());
        assert!(state.path().is_empty());
        assert!(state.markers().is_empty());
        assert_eq!(store.samples().len(), 1);
    }

    #[test]
    fn test_reset_emits_single_clear() {
        let events = EventDispatcher::new(64);
        let mut state =
            SessionState::new(MockStore::new(), SessionOptions::default(), events.clone());
        state.begin_tracking().unwrap();
        let first = state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();
        let second = state.record_fix(LocationFix::new(2.0, 2.0)).unwrap();

        let mut rx = events.subscribe();
        state.reset().unwrap();

        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![SessionEvent::ProjectionCleared {
                markers: vec![
                    CoverageMarker::for_sample(&first, 200.0),
                    CoverageMarker::for_sample(&second, 200.0),
                ],
            }]
        );

        // Nothing left to clear
        state.reset().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resume_announces_whole_projection_at_once() {
        let store = MockStore::new();
        for i in 0..500 {
            store.save(&LocationSample::new(f64::from(i) * 0.001, 0.0)).unwrap();
        }
        let events = EventDispatcher::new(4);
        let mut rx = events.subscribe();
        let mut state = SessionState::new(store.clone(), SessionOptions::default(), events);

        state.resume().unwrap();

        let Ok(SessionEvent::ProjectionReplaced { path, markers }) = rx.try_recv() else {
            panic!("expected the projection first");
        };
        assert_eq!(path, store.samples());
        assert_eq!(markers, state.markers());
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Recenter { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resume_rebuilds_from_store() {
        let store = LocationStore::open_in_memory().unwrap();
        let a = store.save(&LocationSample::new(1.0, 2.0)).unwrap();
        let b = store.save(&LocationSample::new(3.0, 4.0)).unwrap();

        let mut state =
            SessionState::new(store, SessionOptions::default(), EventDispatcher::default());
        let region = state.resume().unwrap().unwrap();

        assert_eq!(state.path(), &[a, b]);
        assert_eq!(state.markers().len(), 2);
        assert_eq!(region.center, GeoPoint::new(1.0, 2.0));
        assert!((region.radius_miles() - 0.5).abs() < 1e-9);
        assert_eq!(state.mode(), TrackingState::Idle);
    }

    #[test]
    fn test_resume_replaces_existing_projection() {
        let store = MockStore::new();
        let mut state = tracking(store.clone());
        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();
        state.record_fix(LocationFix::new(2.0, 2.0)).unwrap();

        assert!(state.resume().unwrap().is_some());
        assert_eq!(state.path().len(), 2);
        assert_eq!(state.markers().len(), 2);
        assert_eq!(state.mode(), TrackingState::Tracking);
    }

    #[test]
    fn test_resume_empty_store() {
        let mut state = SessionState::new(
            MockStore::new(),
            SessionOptions::default(),
            EventDispatcher::default(),
        );
        assert!(state.resume().unwrap().is_none());
        assert!(state.path().is_empty());
    }

    #[test]
    fn test_resume_failure_keeps_projection() {
        let store = MockStore::new();
        let mut state = tracking(store.clone());
        state.record_fix(LocationFix::new(1.0, 1.0)).unwrap();

        store.fail_list(true);
        assert!(state.resume().is_err());
        assert_eq!(state.path().len(), 1);
        assert_eq!(state.markers().len(), 1);
    }
}
