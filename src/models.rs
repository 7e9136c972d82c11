use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A raw file the user selected: name plus its bytes.
///
/// Bytes are shared so the same file can be handed to ingestion and to a
/// merge request without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Read a file from disk, keeping only its file name
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn key(&self) -> FileKey {
        FileKey {
            name: self.name.clone(),
            size: self.size(),
        }
    }

    pub fn format(&self) -> TrackFormat {
        TrackFormat::from_file_name(&self.name)
    }
}

/// Dedup key: two selections with the same name and byte size are the same file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub name: String,
    pub size: u64,
}

/// How a selected file becomes preview text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackFormat {
    /// GPX, parsed locally
    Native,
    /// FIT, converted by the remote service
    ForeignBinary,
    /// Anything else; listed but never plottable
    Unrecognized,
}

impl TrackFormat {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".gpx") {
            TrackFormat::Native
        } else if lower.ends_with(".fit") {
            TrackFormat::ForeignBinary
        } else {
            TrackFormat::Unrecognized
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionState {
    Pending,
    Ready,
    Failed,
}

/// Identity of one ingestion of a file. Removal and re-addition yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user-selected file and its derived preview state
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub id: EntryId,
    pub source: SourceFile,
    pub format: TrackFormat,
    /// Standard-format text, written at most once per ingestion
    pub preview_text: Option<Arc<str>>,
    /// `None` while a native file is unread, and forever for unrecognized files
    pub conversion_state: Option<ConversionState>,
}

impl TrackEntry {
    pub fn new(source: SourceFile) -> Self {
        let format = source.format();
        let conversion_state = match format {
            TrackFormat::ForeignBinary => Some(ConversionState::Pending),
            TrackFormat::Native | TrackFormat::Unrecognized => None,
        };

        Self {
            id: EntryId::new(),
            source,
            format,
            preview_text: None,
            conversion_state,
        }
    }

    pub fn key(&self) -> FileKey {
        self.source.key()
    }

    /// True while an asynchronous read or conversion is still outstanding
    pub fn is_in_flight(&self) -> bool {
        match self.format {
            TrackFormat::Native => self.conversion_state.is_none(),
            TrackFormat::ForeignBinary => {
                self.conversion_state == Some(ConversionState::Pending)
            }
            TrackFormat::Unrecognized => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Axis-aligned region in geographic degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest region enclosing all points, or `None` for no points
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        points.into_iter().fold(None, |acc: Option<Bounds>, p| {
            let point = Bounds::new(p.lat, p.lng, p.lat, p.lng);
            Some(match acc {
                Some(b) => b.union(&point),
                None => point,
            })
        })
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south <= self.north
            && self.west <= self.east
    }

    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }
}

/// The map's visible region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Viewport {
    Initial { center: LatLng, zoom: u8 },
    Fitted(Bounds),
}

impl Default for Viewport {
    fn default() -> Self {
        // Europe
        Viewport::Initial {
            center: LatLng {
                lat: 48.8584,
                lng: 2.2945,
            },
            zoom: 3,
        }
    }
}
