//! Trait abstraction for location providers.
//!
//! This module provides the [`LocationSource`] trait that abstracts over a
//! platform location service and mock sources for testing.

use async_trait::async_trait;
use tokio::sync::mpsc;

use trailmap_types::LocationFix;

use crate::error::Result;

/// Channel end a source pushes fixes into.
///
/// The channel is bounded: when the session falls behind, `send` waits
/// instead of dropping fixes.
pub type FixSender = mpsc::Sender<LocationFix>;

/// A push-based provider of location fixes.
///
/// # Example
///
/// ```ignore
/// use trailmap_core::{FixSender, LocationSource, Result};
///
/// struct Gps { /* platform handle */ }
///
/// #[async_trait::async_trait]
/// impl LocationSource for Gps {
///     async fn subscribe(&self, sink: FixSender) -> Result<()> {
///         // start the platform listener and forward every fix into `sink`
///         Ok(())
///     }
///
///     async fn unsubscribe(&self) -> Result<()> {
///         // stop the listener and drop `sink`
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Start delivering fixes into `sink`.
    ///
    /// A source that cannot start (permission denied, no hardware) must
    /// return [`Error::SourceUnavailable`](crate::Error::SourceUnavailable).
    async fn subscribe(&self, sink: FixSender) -> Result<()>;

    /// Stop delivering fixes and release the sink.
    ///
    /// Must be safe to call when not subscribed.
    async fn unsubscribe(&self) -> Result<()>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "location source"
    }
}
