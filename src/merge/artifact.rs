use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Name every merged download is saved under
pub const MERGED_FILE_NAME: &str = "combined.gpx";

/// The merge service's response body, byte for byte
#[derive(Debug, Clone, PartialEq)]
pub struct MergeArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MergeArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            file_name: MERGED_FILE_NAME.to_string(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the artifact into `dir`, replacing any previous download
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}
