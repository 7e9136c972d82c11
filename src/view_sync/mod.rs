// # View Sync Module
//
// Derives the map view from the current file set:
//
// - **ViewSynchronizer**: clears and redraws every entry with preview text,
//   tagging each render with the rebuild's generation
// - **RenderCycle**: per-generation completion counter and bounds union
//
// The viewport is applied in one step once every render of the current
// generation has reported. Completions from superseded generations are dropped.

mod cycle;
mod synchronizer;

pub use cycle::RenderCycle;
pub use synchronizer::{CompletionOutcome, RenderCompletion, RenderRequest, ViewSynchronizer};
