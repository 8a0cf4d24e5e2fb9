//! Platform-agnostic value types for recorded location history.
//!
//! This crate provides the types shared by the store (`trailmap-store`)
//! and the tracking session (`trailmap-core`).
//!
//! # Features
//!
//! - [`LocationSample`]: a coordinate pair with an optional persisted identity
//! - [`LocationFix`]: a raw, unidentified coordinate message from a location source
//! - [`CoverageMarker`] and [`ViewRegion`]: visualization primitives
//! - Default radii used by the session
//!
//! # Example
//!
//! ```
//! use trailmap_types::{CoverageMarker, DEFAULT_MARKER_RADIUS_M, LocationSample};
//!
//! let sample = LocationSample::new(37.0, -122.0).with_id(1);
//! let marker = CoverageMarker::for_sample(&sample, DEFAULT_MARKER_RADIUS_M);
//! assert_eq!(marker.center, sample.point());
//! ```

pub mod types;

pub use types::{
    CoverageMarker, DEFAULT_FOLLOW_RADIUS_M, DEFAULT_MARKER_RADIUS_M, DEFAULT_OVERVIEW_RADIUS_M,
    GeoPoint, LocationFix, LocationSample, METERS_PER_MILE, ViewRegion,
};
