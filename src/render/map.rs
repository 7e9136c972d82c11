use crate::models::{Bounds, EntryId, LatLng, Viewport};
use std::sync::{Arc, Mutex};

/// A drawn track on the map surface
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayer {
    pub entry_id: EntryId,
    pub name: String,
    pub color: String,
    pub polylines: Vec<Vec<LatLng>>,
    pub bounds: Option<Bounds>,
}

/// The single view surface tracks are drawn onto
pub trait MapSurface: Send {
    fn clear_tracks(&mut self);
    fn draw_track(&mut self, layer: TrackLayer);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn viewport(&self) -> Viewport;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub layers: Vec<TrackLayer>,
    pub viewport: Viewport,
    /// Number of times a viewport has been fitted
    pub fit_count: usize,
}

/// Map surface kept in memory. Clones share the same state, so a caller can
/// keep a handle for inspection while the view synchronizer owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMap {
    state: Arc<Mutex<MapState>>,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MapState {
        self.state.lock().unwrap().clone()
    }
}

impl MapSurface for InMemoryMap {
    fn clear_tracks(&mut self) {
        self.state.lock().unwrap().layers.clear();
    }

    fn draw_track(&mut self, layer: TrackLayer) {
        self.state.lock().unwrap().layers.push(layer);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        let mut state = self.state.lock().unwrap();
        state.viewport = Viewport::Fitted(bounds);
        state.fit_count += 1;
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().unwrap().viewport
    }
}
