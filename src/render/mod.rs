// # Render Module
//
// The rendering collaborator and the map surface it draws onto:
//
// - **TrackRenderer**: turns preview text into drawable geometry and its bounds
// - **LazyRenderer**: one-time, bounded initialization shared by concurrent renders
// - **GpxRenderer**: built-in renderer backed by the `gpx` crate
// - **MapSurface**: the single view surface, mutated only by the view synchronizer

mod gpx_renderer;
mod loader;
mod map;

pub use gpx_renderer::GpxRenderer;
pub use loader::LazyRenderer;
pub use map::{InMemoryMap, MapState, MapSurface, TrackLayer};

use crate::models::{Bounds, LatLng};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Renderer failed to load: {0}")]
    LoadFailed(String),
    #[error("Renderer did not load within {0:?}")]
    LoadTimedOut(Duration),
    #[error("Track could not be parsed: {0}")]
    Parse(String),
}

/// Geometry produced from one preview text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedTrack {
    pub polylines: Vec<Vec<LatLng>>,
    /// `None` when the track has no drawable points
    pub bounds: Option<Bounds>,
}

impl RenderedTrack {
    pub fn from_polylines(polylines: Vec<Vec<LatLng>>) -> Self {
        let bounds = Bounds::from_points(polylines.iter().flatten().copied());
        Self { polylines, bounds }
    }

    pub fn point_count(&self) -> usize {
        self.polylines.iter().map(Vec::len).sum()
    }
}

/// Trait for the rendering collaborator (allows mocking for tests)
#[async_trait::async_trait]
pub trait TrackRenderer: Send + Sync {
    /// One-time initialization before the first render
    async fn load(&self) -> Result<(), RenderError>;
    async fn render(&self, preview_text: &str) -> Result<RenderedTrack, RenderError>;
}
