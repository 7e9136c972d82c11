use crate::models::{Bounds, EntryId};
use std::collections::HashSet;
use tracing::trace;

/// Tracks render completions for one rebuild generation.
///
/// `expected` is fixed when the cycle starts. Each entry counts once; a
/// completion without bounds (failed or empty render) still counts but adds
/// nothing to the union.
#[derive(Debug, Clone)]
pub struct RenderCycle {
    generation: u64,
    expected: usize,
    received: HashSet<EntryId>,
    union: Option<Bounds>,
}

impl RenderCycle {
    pub fn new(generation: u64, expected: usize) -> Self {
        Self {
            generation,
            expected,
            received: HashSet::new(),
            union: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received.len()
    }

    pub fn union(&self) -> Option<Bounds> {
        self.union
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() >= self.expected
    }

    /// Record one entry's completion. Returns false if the entry already reported.
    pub fn record(&mut self, entry_id: EntryId, bounds: Option<Bounds>) -> bool {
        if !self.received.insert(entry_id) {
            return false;
        }

        if let Some(bounds) = bounds.filter(Bounds::is_valid) {
            self.union = Some(match self.union {
                Some(acc) => acc.union(&bounds),
                None => bounds,
            });
        }

        trace!(
            "Generation {}: {}/{} renders reported",
            self.generation,
            self.received.len(),
            self.expected
        );
        true
    }
}
