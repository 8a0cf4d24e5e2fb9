//! Mock collaborators for testing.
//!
//! [`MockLocationSource`] implements [`LocationSource`] and lets tests push
//! fixes by hand. [`MockStore`] implements [`SampleStore`] in memory and can
//! be told to fail, which the SQLite store cannot easily be made to do.
//!
//! # Features
//!
//! - **Failure injection**: refuse subscription, fail saves, lists or clears
//! - **Counted failures**: fail the next `n` saves and then recover
//! - **Random walks**: push a jittered track around a starting point

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::RwLock;

use trailmap_store::SampleStore;
use trailmap_types::{GeoPoint, LocationFix, LocationSample};

use crate::error::{Error, Result};
use crate::traits::{FixSender, LocationSource};

/// A mock location source for testing.
///
/// # Example
///
/// ```
/// use trailmap_core::{LocationSource, MockLocationSource};
/// use trailmap_types::LocationFix;
///
/// #[tokio::main]
/// async fn main() {
///     let source = MockLocationSource::new();
///     let (tx, mut rx) = tokio::sync::mpsc::channel(4);
///     source.subscribe(tx).await.unwrap();
///
///     assert!(source.push(LocationFix::new(1.0, 2.0)).await);
///     assert_eq!(rx.recv().await, Some(LocationFix::new(1.0, 2.0)));
/// }
/// ```
pub struct MockLocationSource {
    name: String,
    sink: RwLock<Option<FixSender>>,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    subscribe_count: AtomicU32,
    unsubscribe_count: AtomicU32,
}

impl std::fmt::Debug for MockLocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLocationSource")
            .field("name", &self.name)
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLocationSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self {
            name: "mock location source".to_string(),
            sink: RwLock::new(None),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("location permission denied".to_string()),
            subscribe_count: AtomicU32::new(0),
            unsubscribe_count: AtomicU32::new(0),
        }
    }

    /// Make subsequent subscriptions fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Set the message reported when subscription fails.
    pub async fn set_fail_message(&self, message: impl Into<String>) {
        *self.fail_message.write().await = message.into();
    }

    /// Whether a subscriber is currently attached.
    pub async fn is_subscribed(&self) -> bool {
        self.sink.read().await.is_some()
    }

    /// Number of successful subscriptions.
    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::Relaxed)
    }

    /// Number of unsubscribe calls that detached a subscriber.
    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribe_count.load(Ordering::Relaxed)
    }

    /// Deliver one fix. Returns `false` if nobody is subscribed.
    ///
    /// Waits if the subscriber's channel is full.
    pub async fn push(&self, fix: LocationFix) -> bool {
        let Some(sink) = self.sink.read().await.clone() else {
            return false;
        };
        sink.send(fix).await.is_ok()
    }

    /// Deliver every fix from a stream. Returns how many were delivered.
    pub async fn replay<S>(&self, fixes: S) -> usize
    where
        S: Stream<Item = LocationFix>,
    {
        let mut fixes = std::pin::pin!(fixes);
        let mut delivered = 0;
        while let Some(fix) = fixes.next().await {
            if !self.push(fix).await {
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Deliver `steps` fixes wandering randomly away from `start`.
    ///
    /// Each step moves at most `max_step_deg` degrees on each axis. Returns
    /// the fixes that were delivered.
    pub async fn push_random_walk(
        &self,
        start: GeoPoint,
        steps: usize,
        max_step_deg: f64,
    ) -> Vec<LocationFix> {
        let mut current = start;
        let mut delivered = Vec::with_capacity(steps);
        for _ in 0..steps {
            current.latitude += (rand::random::<f64>() * 2.0 - 1.0) * max_step_deg;
            current.longitude += (rand::random::<f64>() * 2.0 - 1.0) * max_step_deg;
            let fix = LocationFix::from(current);
            if !self.push(fix).await {
                break;
            }
            delivered.push(fix);
        }
        delivered
    }
}

#[async_trait]
impl LocationSource for MockLocationSource {
    async fn subscribe(&self, sink: FixSender) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::SourceUnavailable(self.fail_message.read().await.clone()));
        }
        *self.sink.write().await = Some(sink);
        self.subscribe_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        if self.sink.write().await.take().is_some() {
            self.unsubscribe_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default)]
struct MockStoreInner {
    rows: Vec<LocationSample>,
    next_id: i64,
    remaining_save_failures: u32,
    fail_saves: bool,
    fail_list: bool,
    fail_clear: bool,
    save_calls: u32,
}

/// An in-memory [`SampleStore`] with failure injection.
///
/// Clones share the same rows, so a test can keep a handle after moving
/// the store into a session.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every save until turned off.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Fail the next `count` saves, then succeed again.
    pub fn fail_next_saves(&self, count: u32) {
        self.lock().remaining_save_failures = count;
    }

    /// Fail every `list_all` until turned off.
    pub fn fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    /// Fail every `clear_all` until turned off.
    pub fn fail_clear(&self, fail: bool) {
        self.lock().fail_clear = fail;
    }

    /// Snapshot of the stored rows.
    pub fn samples(&self) -> Vec<LocationSample> {
        self.lock().rows.clone()
    }

    /// Number of save calls, including failed ones.
    pub fn save_calls(&self) -> u32 {
        self.lock().save_calls
    }
}

fn simulated(what: &str) -> trailmap_store::Error {
    trailmap_store::Error::Io(std::io::Error::other(format!("simulated {what} failure")))
}

impl SampleStore for MockStore {
    fn save(&self, sample: &LocationSample) -> trailmap_store::Result<LocationSample> {
        let mut inner = self.lock();
        inner.save_calls += 1;

        if inner.remaining_save_failures > 0 {
            inner.remaining_save_failures -= 1;
            return Err(simulated("save"));
        }
        if inner.fail_saves {
            return Err(simulated("save"));
        }

        if sample.is_persisted() {
            let row = inner
                .rows
                .iter_mut()
                .find(|row| row.id == sample.id)
                .ok_or(trailmap_store::Error::SampleNotFound(sample.id))?;
            *row = *sample;
            Ok(*sample)
        } else {
            inner.next_id += 1;
            let saved = sample.with_id(inner.next_id);
            inner.rows.push(saved);
            Ok(saved)
        }
    }

    fn list_all(&self) -> trailmap_store::Result<Vec<LocationSample>> {
        let inner = self.lock();
        if inner.fail_list {
            return Err(simulated("list"));
        }
        Ok(inner.rows.clone())
    }

    fn clear_all(&self) -> trailmap_store::Result<()> {
        let mut inner = self.lock();
        if inner.fail_clear {
            return Err(simulated("clear"));
        }
        inner.rows.clear();
        Ok(())
    }
}
