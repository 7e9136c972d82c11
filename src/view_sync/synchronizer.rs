use super::cycle::RenderCycle;
use crate::models::{Bounds, EntryId, TrackEntry, Viewport};
use crate::palette::Palette;
use crate::render::{MapSurface, RenderError, RenderedTrack, TrackLayer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One render to issue to the rendering collaborator
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub generation: u64,
    pub entry_id: EntryId,
    pub index: usize,
    pub name: String,
    pub color: String,
    pub preview_text: Arc<str>,
}

/// A render result reported back for the request it was issued for
#[derive(Debug, Clone)]
pub struct RenderCompletion {
    pub request: RenderRequest,
    pub result: Result<RenderedTrack, RenderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Belongs to a superseded generation, or the entry already reported
    Stale,
    Pending { received: usize, expected: usize },
    /// All renders of the generation reported. Carries the applied viewport,
    /// if the union was a valid region.
    Settled { viewport: Option<Bounds> },
}

/// Rebuilds the map from the file set and applies the aggregate viewport.
///
/// Exclusive owner of the map surface.
pub struct ViewSynchronizer {
    map: Box<dyn MapSurface>,
    palette: Palette,
    generation: u64,
    cycle: RenderCycle,
}

impl ViewSynchronizer {
    pub fn new(map: Box<dyn MapSurface>, palette: Palette) -> Self {
        Self {
            map,
            palette,
            generation: 0,
            cycle: RenderCycle::new(0, 0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cycle(&self) -> &RenderCycle {
        &self.cycle
    }

    pub fn is_settled(&self) -> bool {
        self.cycle.is_complete()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn viewport(&self) -> Viewport {
        self.map.viewport()
    }

    /// Clear all drawn tracks and start a new generation.
    ///
    /// Returns one request per entry that currently has preview text. The
    /// number of requests is the count the new generation waits for.
    pub fn rebuild(&mut self, entries: &[TrackEntry]) -> Vec<RenderRequest> {
        self.map.clear_tracks();
        self.generation += 1;

        let requests: Vec<RenderRequest> = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry.preview_text.as_ref().map(|text| RenderRequest {
                    generation: self.generation,
                    entry_id: entry.id,
                    index,
                    name: entry.source.name.clone(),
                    color: self.palette.color_for(index).to_string(),
                    preview_text: text.clone(),
                })
            })
            .collect();

        self.cycle = RenderCycle::new(self.generation, requests.len());

        debug!(
            "Rebuild generation {}: {} of {} entries renderable",
            self.generation,
            requests.len(),
            entries.len()
        );

        requests
    }

    /// Apply a render completion. Only completions of the current generation
    /// draw geometry or count toward the viewport.
    pub fn on_render_complete(&mut self, completion: RenderCompletion) -> CompletionOutcome {
        let RenderCompletion { request, result } = completion;

        if request.generation != self.generation {
            debug!(
                "Dropping render of {} from generation {} (current {})",
                request.name, request.generation, self.generation
            );
            return CompletionOutcome::Stale;
        }

        let bounds = match &result {
            Ok(track) => track.bounds,
            Err(e) => {
                warn!("Render of {} failed: {}", request.name, e);
                None
            }
        };

        if !self.cycle.record(request.entry_id, bounds) {
            return CompletionOutcome::Stale;
        }

        if let Ok(track) = result {
            self.map.draw_track(TrackLayer {
                entry_id: request.entry_id,
                name: request.name,
                color: request.color,
                polylines: track.polylines,
                bounds: track.bounds,
            });
        }

        if !self.cycle.is_complete() {
            return CompletionOutcome::Pending {
                received: self.cycle.received(),
                expected: self.cycle.expected(),
            };
        }

        let viewport = self.cycle.union().filter(Bounds::is_valid);
        if let Some(bounds) = viewport {
            info!(
                "Generation {}: fitting view to {} tracks",
                self.generation,
                self.cycle.expected()
            );
            self.map.fit_bounds(bounds);
        }

        CompletionOutcome::Settled { viewport }
    }
}
