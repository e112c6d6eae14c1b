//! Best-effort persistence of the last layout.
//!
//! The layout is written as a versioned JSON record:
//!
//! ```text
//! {"version":1,"savedAt":"2026-10-18T09:00:00Z","objects":[...]}
//! ```
//!
//! Writes go to a hidden temp file next to the target and are renamed into
//! place, so a crash mid-write never leaves a truncated record behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sweet_protocol::LayoutObject;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// Current layout record version.
pub const LAYOUT_VERSION: u32 = 1;

/// The on-disk layout record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRecord {
    /// Record format version.
    pub version: u32,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
    /// The layout, in placement order.
    pub objects: Vec<LayoutObject>,
}

/// Reads and writes the layout file.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    path: PathBuf,
}

impl LayoutStore {
    /// Creates a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the layout file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "layout.json".into(), |n| n.to_string_lossy());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Loads the persisted layout.
    ///
    /// A missing file is an empty layout.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::LayoutFileCorrupted` if the file is not a valid
    /// record, and `CoreError::Io` if it cannot be read.
    pub async fn load(&self) -> Result<Vec<LayoutObject>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted layout");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let record: LayoutRecord = serde_json::from_str(&contents)
            .map_err(|e| CoreError::layout_corrupted(&self.path, e.to_string()))?;

        if record.version != LAYOUT_VERSION {
            return Err(CoreError::layout_corrupted(
                &self.path,
                format!("unsupported version {}", record.version),
            ));
        }

        Ok(record.objects)
    }

    /// Loads the persisted layout, discarding anything unreadable.
    pub async fn load_or_empty(&self) -> Vec<LayoutObject> {
        match self.load().await {
            Ok(objects) => {
                if !objects.is_empty() {
                    info!(
                        path = %self.path.display(),
                        count = objects.len(),
                        "Recovered persisted layout"
                    );
                }
                objects
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted layout");
                Vec::new()
            }
        }
    }

    /// Persists `objects`, replacing the previous record.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the directory, temp file or rename fails.
    pub async fn save(&self, objects: &[LayoutObject]) -> Result<()> {
        let record = LayoutRecord {
            version: LAYOUT_VERSION,
            saved_at: Utc::now(),
            objects: objects.to_vec(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), count = objects.len(), "Layout persisted");
        Ok(())
    }
}
