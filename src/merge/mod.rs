// # Merge Module
//
// Sends the full ordered file set to the merge service (`POST /upload`) and
// exposes the combined track as a downloadable artifact. Independent of map state.

mod artifact;
mod client;

pub use artifact::{MergeArtifact, MERGED_FILE_NAME};
pub use client::{preflight, HttpMergeClient, MergeClient, MergeError, MergeMode};
