//! Example: Recording a Simulated Walk
//!
//! This example opens a location database, restores any history already
//! stored in it, records a short random walk from the mock location
//! source, and prints what a map renderer would have been told.
//!
//! Run with: `cargo run --example mock_walk -- [DATABASE_PATH]`
//!
//! Without a path, the configured (or platform default) database is used.

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use trailmap_core::{Config, GeoPoint, LocationStore, MapView, MockLocationSource, TrackingSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("trailmap_core=info".parse()?),
        )
        .init();

    let config = Config::load_default()?;
    config.validate()?;

    let store = match env::args().nth(1) {
        Some(path) => LocationStore::open_with_options(&path, &config.storage.store_options())?,
        None => config.storage.open_store()?,
    };

    let source = Arc::new(MockLocationSource::new());
    let mut session = TrackingSession::new(store, Arc::clone(&source), config.session.clone())?;

    // Subscribe before restoring so the view sees the stored history too
    let mut events = session.subscribe();
    let mut view = MapView::new();

    session.resume().await?;
    println!("Restored {} stored samples", session.path().await.len());

    session.start().await?;
    let walk = source
        .push_random_walk(GeoPoint::new(37.7749, -122.4194), 20, 0.0005)
        .await;
    session.stop().await?;

    session.sync_view(&mut view, &mut events).await;

    println!("Recorded {} new fixes", walk.len());
    println!("Path now has {} points", session.path().await.len());
    println!("Map shows {} coverage markers", view.markers.len());
    if let Some(region) = view.region {
        println!(
            "View centered on {} with radius {:.2} mi",
            region.center,
            region.radius_miles()
        );
    }
    if let Some(error) = view.last_error {
        println!("Last persistence error: {}", error);
    }

    Ok(())
}
