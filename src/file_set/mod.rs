// # File Set Module
//
// Owns the ordered, deduplicated collection of selected track files:
//
// - **FileSetManager**: add/remove/replace entries, apply ingestion completions
// - **native**: decodes native track bytes into preview text
//
// The manager never performs I/O itself. Adding files returns `IngestJob`s that
// the session runs asynchronously; their completions come back through
// `FileSetManager::complete_ingest`.

mod manager;
mod native;

pub use manager::{
    AddFilesResult, FileSetError, FileSetManager, IngestJob, IngestOutcome, IngestResult,
    ListItem,
};
pub use native::{decode_native_text, NativeReadError};
