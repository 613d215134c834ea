// Export reader: loads the photo export manifest (`media.json`) and yields
// the records to migrate, in file order.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to read export manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse export manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Export manifest {path} has no `photos` array")]
    MissingPhotos { path: PathBuf },
}

/// One photo entry of the export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Image path relative to the export directory, e.g. `photos/201901/abc.jpg`.
    pub path: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub location: Option<String>,
    /// Kept verbatim; the blog parses it.
    pub taken_at: String,
}

impl MediaRecord {
    /// Location of the image on disk.
    pub fn image_path(&self, export_dir: &Path) -> PathBuf {
        export_dir.join(&self.path)
    }
}

#[derive(Deserialize)]
struct Manifest {
    photos: Option<Vec<MediaRecord>>,
}

// Exports write `""` as often as `null` for missing captions.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Read the manifest at `path` and return its photo records.
pub fn read_records(path: &Path) -> Result<Vec<MediaRecord>, ExportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text).map_err(|e| match e {
        ParseFailure::Json(source) => ExportError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::NoPhotos => ExportError::MissingPhotos {
            path: path.to_path_buf(),
        },
    })
}

enum ParseFailure {
    Json(serde_json::Error),
    NoPhotos,
}

fn parse_records(text: &str) -> Result<Vec<MediaRecord>, ParseFailure> {
    let manifest: Manifest = serde_json::from_str(text).map_err(ParseFailure::Json)?;
    manifest.photos.ok_or(ParseFailure::NoPhotos)
}
