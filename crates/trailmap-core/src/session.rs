//! Live tracking session.
//!
//! A [`TrackingSession`] subscribes to a [`LocationSource`], persists every
//! fix it receives through a [`SampleStore`], and keeps an in-memory
//! projection (path plus coverage markers) matching what was persisted.
//!
//! Fixes travel over a bounded channel into a background pump task. The
//! pump and the caller-facing operations all mutate the session through one
//! lock, and store I/O runs on the blocking thread pool so a slow write
//! never stalls the async runtime.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trailmap_store::SampleStore;
use trailmap_types::{
    CoverageMarker, DEFAULT_FOLLOW_RADIUS_M, DEFAULT_MARKER_RADIUS_M, DEFAULT_OVERVIEW_RADIUS_M,
    LocationFix, LocationSample, ViewRegion,
};

use crate::error::{Error, Result};
use crate::events::{DEFAULT_EVENT_CAPACITY, EventDispatcher, EventReceiver};
use crate::state::SessionState;
use crate::traits::LocationSource;
use crate::view::MapView;

/// Tracking mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Not receiving fixes.
    Idle,
    /// Receiving and persisting fixes.
    Tracking,
    /// Inside a reset; never observable from outside the session lock.
    Clearing,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Tracking => write!(f, "tracking"),
            Self::Clearing => write!(f, "clearing"),
        }
    }
}

/// Options for tracking sessions.
///
/// Use the builder pattern for convenient configuration:
///
/// ```
/// use trailmap_core::SessionOptions;
///
/// let options = SessionOptions::builder()
///     .buffer_size(128)
///     .marker_radius_m(150.0)
///     .clear_on_start(true)
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Capacity of the fix channel between source and session.
    /// Default: 64 fixes.
    pub buffer_size: usize,
    /// Capacity of the session event channel.
    /// Default: 256 events.
    pub event_capacity: usize,
    /// Radius of every coverage marker, in meters.
    /// Default: 200 m.
    pub marker_radius_m: f64,
    /// View radius suggested when following a live fix.
    /// Default: 0.1 mile.
    pub follow_radius_m: f64,
    /// View radius suggested after restoring history.
    /// Default: 0.5 mile.
    pub overview_radius_m: f64,
    /// Suggest a recenter for every fix instead of only the first after `start`.
    pub recenter_on_every_fix: bool,
    /// Reset the history every time tracking starts.
    pub clear_on_start: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            marker_radius_m: DEFAULT_MARKER_RADIUS_M,
            follow_radius_m: DEFAULT_FOLLOW_RADIUS_M,
            overview_radius_m: DEFAULT_OVERVIEW_RADIUS_M,
            recenter_on_every_fix: false,
            clear_on_start: false,
        }
    }
}

impl SessionOptions {
    /// Create a new builder for SessionOptions.
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let errors = crate::config::validate_session(self, "session");
        if errors.is_empty() {
            Ok(())
        } else {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(Error::InvalidConfig(message))
        }
    }
}

/// Builder for SessionOptions.
#[derive(Debug, Clone, Default)]
pub struct SessionOptionsBuilder {
    options: SessionOptions,
}

impl SessionOptionsBuilder {
    /// Set the fix channel capacity.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.options.buffer_size = size;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }

    /// Set the coverage marker radius in meters.
    #[must_use]
    pub fn marker_radius_m(mut self, radius: f64) -> Self {
        self.options.marker_radius_m = radius;
        self
    }

    /// Set the follow radius in meters.
    #[must_use]
    pub fn follow_radius_m(mut self, radius: f64) -> Self {
        self.options.follow_radius_m = radius;
        self
    }

    /// Set the overview radius in meters.
    #[must_use]
    pub fn overview_radius_m(mut self, radius: f64) -> Self {
        self.options.overview_radius_m = radius;
        self
    }

    /// Suggest a recenter for every recorded fix.
    #[must_use]
    pub fn recenter_on_every_fix(mut self, enabled: bool) -> Self {
        self.options.recenter_on_every_fix = enabled;
        self
    }

    /// Reset the history whenever tracking starts.
    #[must_use]
    pub fn clear_on_start(mut self, enabled: bool) -> Self {
        self.options.clear_on_start = enabled;
        self
    }

    /// Build the SessionOptions.
    #[must_use]
    pub fn build(self) -> SessionOptions {
        self.options
    }
}

struct Pump {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

type Shared<S> = Arc<Mutex<SessionState<S>>>;

/// A live tracking session over a store and a location source.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trailmap_core::{MockLocationSource, SessionOptions, TrackingSession};
/// use trailmap_store::LocationStore;
/// use trailmap_types::LocationFix;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = LocationStore::open_in_memory()?;
///     let source = Arc::new(MockLocationSource::new());
///     let mut session =
///         TrackingSession::open(store, Arc::clone(&source), SessionOptions::default()).await?;
///
///     session.start().await?;
///     source.push(LocationFix::new(37.0, -122.0)).await;
///     session.stop().await?;
///
///     assert_eq!(session.path().await.len(), 1);
///     Ok(())
/// }
/// ```
pub struct TrackingSession<S, L: ?Sized> {
    shared: Shared<S>,
    source: Arc<L>,
    events: EventDispatcher,
    options: SessionOptions,
    pump: Option<Pump>,
}

impl<S, L> TrackingSession<S, L>
where
    S: SampleStore,
    L: LocationSource + ?Sized + 'static,
{
    /// Create an idle session with an empty projection.
    ///
    /// Most callers want [`open`](Self::open), which also restores the
    /// stored history.
    pub fn new(store: S, source: Arc<L>, options: SessionOptions) -> Result<Self> {
        options.validate()?;

        let events = EventDispatcher::new(options.event_capacity);
        let state = SessionState::new(store, options.clone(), events.clone());

        Ok(Self {
            shared: Arc::new(Mutex::new(state)),
            source,
            events,
            options,
            pump: None,
        })
    }

    /// Create a session and immediately restore the stored history.
    pub async fn open(store: S, source: Arc<L>, options: SessionOptions) -> Result<Self> {
        let session = Self::new(store, source, options)?;
        session.resume().await?;
        Ok(session)
    }

    /// Subscribe to projection changes.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The options this session was created with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current tracking mode.
    pub async fn state(&self) -> TrackingState {
        self.shared.lock().await.mode()
    }

    /// Whether the session is currently tracking.
    pub async fn is_tracking(&self) -> bool {
        self.state().await == TrackingState::Tracking
    }

    /// Snapshot of the recorded path.
    pub async fn path(&self) -> Vec<LocationSample> {
        self.shared.lock().await.path().to_vec()
    }

    /// Snapshot of the coverage markers.
    pub async fn coverage_markers(&self) -> Vec<CoverageMarker> {
        self.shared.lock().await.markers().to_vec()
    }

    /// Bring `view` up to date with the events queued on `events`.
    ///
    /// If the receiver fell behind and lost events, it is resubscribed and
    /// the view is rebuilt from the session's current projection. Events are
    /// only emitted with the session lock held, so the snapshot and the new
    /// receiver's position line up exactly. Returns how many queued events
    /// were applied.
    pub async fn sync_view(&self, view: &mut MapView, events: &mut EventReceiver) -> usize {
        let applied = view.drain(events);
        if view.stale {
            let state = self.shared.lock().await;
            *events = events.resubscribe();
            view.restore(
                state.path(),
                state.markers(),
                state.mode() == TrackingState::Tracking,
            );
            debug!("Map view rebuilt from {} samples", state.path().len());
        }
        applied
    }

    /// Start tracking.
    ///
    /// Fails with [`Error::InvalidState`] if already tracking and with
    /// [`Error::SourceUnavailable`] if the source cannot start; in both
    /// cases the session stays as it was.
    pub async fn start(&mut self) -> Result<()> {
        let state = self.state().await;
        if state != TrackingState::Idle || self.pump.is_some() {
            return Err(Error::invalid_state("start", state));
        }

        if self.options.clear_on_start {
            self.reset().await?;
        }

        let (tx, rx) = mpsc::channel(self.options.buffer_size);
        self.source.subscribe(tx).await.map_err(|e| match e {
            Error::SourceUnavailable(_) => e,
            other => Error::SourceUnavailable(other.to_string()),
        })?;

        if let Err(e) = run_locked(&self.shared, SessionState::begin_tracking).await {
            let _ = self.source.unsubscribe().await;
            return Err(e);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(pump(
            Arc::clone(&self.shared),
            Arc::clone(&self.source),
            rx,
            cancel_token.clone(),
        ));
        self.pump = Some(Pump {
            handle,
            cancel_token,
        });

        info!("Tracking started on {}", self.source.name());
        Ok(())
    }

    /// Stop tracking.
    ///
    /// Fixes already queued when this is called are still recorded; once it
    /// returns no further fixes are processed. Calling it while idle is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(pump) = self.pump.take() else {
            debug!("Stop requested while not tracking");
            return Ok(());
        };

        pump.cancel_token.cancel();
        if let Err(e) = pump.handle.await {
            warn!("Fix pump ended abnormally: {}", e);
        }

        run_locked(&self.shared, |state| {
            state.end_tracking();
            Ok(())
        })
        .await?;

        info!("Tracking stopped");
        Ok(())
    }

    /// Clear the projection and the stored history.
    ///
    /// Valid in any state. If the store cannot be cleared the projection
    /// stays cleared and [`Error::StoreDiverged`] is returned; calling
    /// `reset` again retries the store.
    pub async fn reset(&self) -> Result<()> {
        run_locked(&self.shared, SessionState::reset).await
    }

    /// Rebuild the projection from the store's full history.
    ///
    /// Returns the suggested initial view, framing the first stored sample.
    pub async fn resume(&self) -> Result<Option<ViewRegion>> {
        run_locked(&self.shared, SessionState::resume).await
    }

    /// Record one fix: persist it, then extend the path and markers.
    ///
    /// This is what the pump calls for every fix the source delivers; it can
    /// also be called directly. Only valid while tracking.
    pub async fn on_location_event(&self, fix: LocationFix) -> Result<LocationSample> {
        run_locked(&self.shared, move |state| state.record_fix(fix)).await
    }
}

/// Dropping a tracking session cancels its pump, which detaches the source.
impl<S, L: ?Sized> Drop for TrackingSession<S, L> {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.cancel_token.cancel();
        }
    }
}

/// Run `f` against the session state on the blocking pool with the lock held.
async fn run_locked<S, T, F>(shared: &Shared<S>, f: F) -> Result<T>
where
    S: SampleStore,
    T: Send + 'static,
    F: FnOnce(&mut SessionState<S>) -> Result<T> + Send + 'static,
{
    let shared = Arc::clone(shared);
    match tokio::task::spawn_blocking(move || {
        let mut state = shared.blocking_lock();
        f(&mut state)
    })
    .await
    {
        Ok(result) => result,
        Err(e) => Err(Error::TaskFailed(e.to_string())),
    }
}

async fn pump<S, L>(
    shared: Shared<S>,
    source: Arc<L>,
    mut rx: mpsc::Receiver<LocationFix>,
    cancel_token: CancellationToken,
) where
    S: SampleStore,
    L: LocationSource + ?Sized + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                // Refuse new fixes, then record whatever was already queued.
                rx.close();
                while let Some(fix) = rx.recv().await {
                    deliver(&shared, fix).await;
                }
                debug!("Fix pump cancelled, stopping gracefully");
                break;
            }
            fix = rx.recv() => match fix {
                Some(fix) => deliver(&shared, fix).await,
                None => {
                    debug!("Location source closed its channel");
                    break;
                }
            }
        }
    }

    if let Err(e) = source.unsubscribe().await {
        warn!("Failed to unsubscribe from {}: {}", source.name(), e);
    }
}

async fn deliver<S: SampleStore>(shared: &Shared<S>, fix: LocationFix) {
    if let Err(e) = run_locked(shared, move |state| state.record_fix(fix)).await {
        debug!("Fix ({}, {}) not recorded: {}", fix.latitude, fix.longitude, e);
    }
}
