//! Hyperlapse Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary between the hyperlapse engines
//! and the outside world. Everything the engines cannot compute on their own
//! goes through a trait defined here:
//! - Time (`now()`, `sleep()`)
//! - Routing (`resolve_route()`)
//! - Street-level imagery (`resolve_panorama()`, `fetch_panorama_image()`)
//! - Terrain (`fetch_elevations()`)
//!
//! Production code plugs in real map-service clients and [`TokioContext`];
//! the simulation harness plugs in a seeded synthetic provider and a virtual
//! clock, so any run is reproducible from its seed.
//!
//! # Example
//!
//! ```ignore
//! use hyperlapse_env::{HyperlapseContext, PanoramaService, GeoPoint};
//!
//! async fn walk<Ctx: HyperlapseContext, P: PanoramaService>(ctx: &Ctx, panos: &P) {
//!     let here = GeoPoint::new(37.7749, -122.4194);
//!     if let Ok(pano) = panos.resolve_panorama(here, 50.0).await {
//!         println!("{} at {}", pano.panorama_id, pano.location);
//!     }
//!     ctx.sleep(Duration::from_millis(50)).await;
//! }
//! ```

mod context;
mod error;
mod services;
mod tokio_impl;
mod types;

pub use context::HyperlapseContext;
pub use error::EnvError;
pub use services::{
    ElevationService, ImageryService, PanoramaService, RouteService, StreetViewProvider,
};
pub use tokio_impl::TokioContext;
pub use types::{GeoPoint, PanoramaImage, PanoramaLocation, Route, RouteLeg};
