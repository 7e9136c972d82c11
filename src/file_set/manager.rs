use crate::models::{ConversionState, EntryId, FileKey, SourceFile, TrackEntry, TrackFormat};
use crate::palette::Palette;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq)]
pub enum FileSetError {
    #[error("No file at position {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Asynchronous work needed to materialize an entry's preview text
#[derive(Debug, Clone)]
pub enum IngestJob {
    ReadNative { entry_id: EntryId, source: SourceFile },
    Convert { entry_id: EntryId, source: SourceFile },
}

impl IngestJob {
    pub fn entry_id(&self) -> EntryId {
        match self {
            IngestJob::ReadNative { entry_id, .. } | IngestJob::Convert { entry_id, .. } => {
                *entry_id
            }
        }
    }
}

/// Result of an ingestion job, reported back to the manager
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Parsed(String),
    ReadFailed(String),
    Converted(String),
    ConversionFailed(String),
}

/// What applying an ingestion outcome did to the sequence
#[derive(Debug, Clone, PartialEq)]
pub enum IngestResult {
    Ready { index: usize },
    ReadFailed { index: usize },
    ConversionFailed {
        index: usize,
        file_name: String,
        reason: String,
    },
    /// The entry was removed, replaced, or already ingested
    Discarded,
}

#[derive(Debug, Default)]
pub struct AddFilesResult {
    pub added: usize,
    pub skipped: Vec<FileKey>,
    pub jobs: Vec<IngestJob>,
}

/// One row of the displayed file list
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub number: usize,
    pub name: String,
    pub color: String,
    pub format: TrackFormat,
    pub state: Option<ConversionState>,
    pub has_preview: bool,
}

impl std::fmt::Display for ListItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}. {}", self.number, self.name)
    }
}

/// Ordered, deduplicated collection of selected files.
///
/// Single source of truth for what is currently selected. Order is
/// insertion order and drives list numbering and color assignment.
#[derive(Debug, Default)]
pub struct FileSetManager {
    entries: Vec<TrackEntry>,
}

impl FileSetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &FileKey) -> bool {
        self.entries.iter().any(|e| &e.key() == key)
    }

    /// Append files not already present, returning the ingestion work to run.
    ///
    /// A file whose (name, size) pair is already in the sequence is dropped
    /// silently, including duplicates within the same selection.
    pub fn add_files<I>(&mut self, files: I) -> AddFilesResult
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let mut result = AddFilesResult::default();

        for source in files {
            let key = source.key();
            if self.contains_key(&key) {
                debug!("Skipping duplicate {} ({} bytes)", key.name, key.size);
                result.skipped.push(key);
                continue;
            }

            let entry = TrackEntry::new(source);
            match entry.format {
                TrackFormat::Native => result.jobs.push(IngestJob::ReadNative {
                    entry_id: entry.id,
                    source: entry.source.clone(),
                }),
                TrackFormat::ForeignBinary => result.jobs.push(IngestJob::Convert {
                    entry_id: entry.id,
                    source: entry.source.clone(),
                }),
                TrackFormat::Unrecognized => {
                    info!("{} has no known track format, listing without preview", key.name);
                }
            }

            self.entries.push(entry);
            result.added += 1;
        }

        result
    }

    /// Drop the whole set, then add the new selection
    pub fn replace_files<I>(&mut self, files: I) -> AddFilesResult
    where
        I: IntoIterator<Item = SourceFile>,
    {
        self.entries.clear();
        self.add_files(files)
    }

    /// Remove the entry at `index`; later entries shift down by one.
    pub fn remove_file(&mut self, index: usize) -> Result<TrackEntry, FileSetError> {
        if index >= self.entries.len() {
            return Err(FileSetError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Apply an ingestion completion to the entry it was issued for.
    ///
    /// Completions for entries no longer in the sequence, or for entries that
    /// already settled, are discarded.
    pub fn complete_ingest(&mut self, entry_id: EntryId, outcome: IngestOutcome) -> IngestResult {
        let Some(index) = self.entries.iter().position(|e| e.id == entry_id) else {
            debug!("Discarding ingestion result for removed entry {}", entry_id);
            return IngestResult::Discarded;
        };

        let entry = &mut self.entries[index];
        if !entry.is_in_flight() {
            warn!(
                "Ignoring second ingestion result for {} ({:?})",
                entry.source.name, entry.conversion_state
            );
            return IngestResult::Discarded;
        }

        match outcome {
            IngestOutcome::Parsed(text) | IngestOutcome::Converted(text) => {
                entry.preview_text = Some(Arc::from(text));
                entry.conversion_state = Some(ConversionState::Ready);
                IngestResult::Ready { index }
            }
            IngestOutcome::ReadFailed(reason) => {
                debug!("Could not read {}: {}", entry.source.name, reason);
                entry.conversion_state = Some(ConversionState::Failed);
                IngestResult::ReadFailed { index }
            }
            IngestOutcome::ConversionFailed(reason) => {
                entry.conversion_state = Some(ConversionState::Failed);
                IngestResult::ConversionFailed {
                    index,
                    file_name: entry.source.name.clone(),
                    reason,
                }
            }
        }
    }

    /// Raw files in list order, for the merge request
    pub fn sources(&self) -> Vec<SourceFile> {
        self.entries.iter().map(|e| e.source.clone()).collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_in_flight()).count()
    }

    pub fn display_list(&self, palette: &Palette) -> Vec<ListItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ListItem {
                number: i + 1,
                name: entry.source.name.clone(),
                color: palette.color_for(i).to_string(),
                format: entry.format,
                state: entry.conversion_state,
                has_preview: entry.preview_text.is_some(),
            })
            .collect()
    }
}
