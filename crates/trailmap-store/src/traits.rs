//! Trait abstraction over sample persistence.
//!
//! The tracking session only needs three operations from its store. Hiding
//! them behind [`SampleStore`] lets tests substitute a store with injected
//! failures for the SQLite-backed [`LocationStore`].

use trailmap_types::LocationSample;

use crate::error::Result;
use crate::store::LocationStore;

/// Persistence operations required by a tracking session.
///
/// Implementations must not retry internally; every failure is returned
/// to the caller as-is.
pub trait SampleStore: Send + 'static {
    /// Insert an unpersisted sample or update a persisted one.
    ///
    /// Returns the identified sample. The argument is never mutated.
    fn save(&self, sample: &LocationSample) -> Result<LocationSample>;

    /// Every stored sample, ascending by id.
    fn list_all(&self) -> Result<Vec<LocationSample>>;

    /// Delete every stored sample. Must succeed on an empty store.
    fn clear_all(&self) -> Result<()>;
}

impl SampleStore for LocationStore {
    fn save(&self, sample: &LocationSample) -> Result<LocationSample> {
        LocationStore::save(self, sample)
    }

    fn list_all(&self) -> Result<Vec<LocationSample>> {
        LocationStore::list_all(self)
    }

    fn clear_all(&self) -> Result<()> {
        LocationStore::clear_all(self)
    }
}
