//! Core value types for recorded location history.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Meters in one statute mile.
pub const METERS_PER_MILE: f64 = 1609.344;

/// Default radius of a coverage marker, in meters.
pub const DEFAULT_MARKER_RADIUS_M: f64 = 200.0;

/// Default view radius when following a live fix (0.1 mile).
pub const DEFAULT_FOLLOW_RADIUS_M: f64 = 0.1 * METERS_PER_MILE;

/// Default view radius when framing restored history (0.5 mile).
pub const DEFAULT_OVERVIEW_RADIUS_M: f64 = 0.5 * METERS_PER_MILE;

/// A latitude/longitude pair in degrees.
///
/// No range validation is performed; values are carried verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A raw location message pushed by a location source.
///
/// Fixes carry no identity; they become [`LocationSample`]s once persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl LocationFix {
    /// Create a new fix.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The fix as a plain point.
    #[must_use]
    pub const fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl From<GeoPoint> for LocationFix {
    fn from(point: GeoPoint) -> Self {
        Self::new(point.latitude, point.longitude)
    }
}

/// One recorded latitude/longitude observation.
///
/// An `id` of `0` means the sample has not been persisted yet. The store
/// assigns a non-zero id on first insert and every later save of a sample
/// carrying that id updates the same row.
///
/// # Examples
///
/// ```
/// use trailmap_types::LocationSample;
///
/// let sample = LocationSample::new(37.0, -122.0);
/// assert!(!sample.is_persisted());
///
/// let stored = sample.with_id(1);
/// assert!(stored.is_persisted());
/// assert_eq!(stored.latitude, 37.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationSample {
    /// Row identity; `0` until persisted.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: i64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl LocationSample {
    /// Identity of a sample that has not been persisted.
    pub const UNSET_ID: i64 = 0;

    /// Create an unpersisted sample.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            id: Self::UNSET_ID,
            latitude,
            longitude,
        }
    }

    /// Return a copy of this sample carrying the given id.
    #[must_use]
    pub const fn with_id(self, id: i64) -> Self {
        Self { id, ..self }
    }

    /// Return a copy of this sample moved to new coordinates, keeping its id.
    #[must_use]
    pub const fn moved_to(self, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..self
        }
    }

    /// Whether the store has assigned an id to this sample.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id != Self::UNSET_ID
    }

    /// The sample's coordinates.
    #[must_use]
    pub const fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl From<LocationFix> for LocationSample {
    fn from(fix: LocationFix) -> Self {
        Self::new(fix.latitude, fix.longitude)
    }
}

impl fmt::Display for LocationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_persisted() {
            write!(f, "#{} {}", self.id, self.point())
        } else {
            write!(f, "unsaved {}", self.point())
        }
    }
}

/// A heat-map circle contributed by one stored sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverageMarker {
    /// Center of the circle.
    pub center: GeoPoint,
    /// Radius in meters.
    pub radius_m: f64,
}

impl CoverageMarker {
    /// Create a marker centered on a sample.
    #[must_use]
    pub const fn for_sample(sample: &LocationSample, radius_m: f64) -> Self {
        Self {
            center: sample.point(),
            radius_m,
        }
    }
}

/// A suggested view: center point plus visible radius.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewRegion {
    /// View center.
    pub center: GeoPoint,
    /// Visible radius in meters.
    pub radius_m: f64,
}

impl ViewRegion {
    /// Create a region around a center point.
    #[must_use]
    pub const fn new(center: GeoPoint, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    /// Radius expressed in statute miles.
    #[must_use]
    pub fn radius_miles(&self) -> f64 {
        self.radius_m / METERS_PER_MILE
    }
}
