//! Local persistence for recorded location samples.
//!
//! This crate provides SQLite-based storage for location history, with
//! upsert-by-identity saves and a bulk clear.
//!
//! # Features
//!
//! - Insert new samples and receive their assigned ids
//! - Update a persisted sample in place by id
//! - List the full history in insertion order
//! - Clear the whole history
//! - Adopt an existing `LocationData` table written by an earlier app
//!
//! # Example
//!
//! ```no_run
//! use trailmap_store::LocationStore;
//! use trailmap_types::LocationSample;
//!
//! let store = LocationStore::open_default()?;
//!
//! let saved = store.save(&LocationSample::new(37.0, -122.0))?;
//! assert!(saved.is_persisted());
//!
//! for sample in store.list_all()? {
//!     println!("{sample}");
//! }
//! # Ok::<(), trailmap_store::Error>(())
//! ```

mod error;
mod schema;
mod store;
mod traits;

pub use error::{Error, Result};
pub use schema::{SCHEMA_VERSION, TABLE};
pub use store::{DEFAULT_BUSY_TIMEOUT, LocationStore, StoreOptions};
pub use traits::SampleStore;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/trailmap/locations.db3`
/// - macOS: `~/Library/Application Support/trailmap/locations.db3`
/// - Windows: `C:\Users\<user>\AppData\Local\trailmap\locations.db3`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("trailmap")
        .join("locations.db3")
}
