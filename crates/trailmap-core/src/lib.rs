//! Live location tracking over a persistent history.
//!
//! This crate turns a stream of location fixes into persisted samples and
//! keeps an in-memory projection of the history (a path plus heat-map
//! coverage markers) consistent with what has been persisted.
//!
//! # Features
//!
//! - **Tracking lifecycle**: `start`, `stop`, `reset` and `resume` on a
//!   [`TrackingSession`]
//! - **Pluggable sources**: anything implementing [`LocationSource`]
//! - **Pluggable storage**: anything implementing [`SampleStore`], normally
//!   the SQLite-backed [`trailmap_store::LocationStore`]
//! - **Render notifications**: [`SessionEvent`]s over a broadcast channel,
//!   mirrored by [`MapView`]
//! - **Configuration**: TOML file with storage and session sections
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trailmap_core::{Config, MockLocationSource, TrackingSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default()?;
//!     let store = config.storage.open_store()?;
//!     let source = Arc::new(MockLocationSource::new());
//!
//!     // Restores the stored history before returning
//!     let mut session = TrackingSession::open(store, source, config.session).await?;
//!     let mut events = session.subscribe();
//!
//!     session.start().await?;
//!     // ... fixes arrive through the source ...
//!     session.stop().await?;
//!
//!     while let Ok(event) = events.try_recv() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod mock;
pub mod session;
mod state;
pub mod traits;
pub mod view;

pub use config::{Config, ConfigError, StorageConfig, ValidationError};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use mock::{MockLocationSource, MockStore};
pub use session::{SessionOptions, SessionOptionsBuilder, TrackingSession, TrackingState};
pub use traits::{FixSender, LocationSource};
pub use view::MapView;

// Re-export the pieces callers need from the lower crates
pub use trailmap_store::{LocationStore, SampleStore};
pub use trailmap_types::{
    CoverageMarker, GeoPoint, LocationFix, LocationSample, ViewRegion,
};
