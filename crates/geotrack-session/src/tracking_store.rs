//! Persisted "is tracking" flag.
//!
//! Stored as a small JSON document next to the config file so the flag
//! survives restarts. A missing or unreadable document reads as not tracking.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use geotrack_core::StorageError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPrefs {
    #[serde(default)]
    pub is_tracking: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct TrackingStore {
    path: PathBuf,
    prefs: TrackingPrefs,
}

impl TrackingStore {
    /// Open the store at `path`, falling back to defaults when the file is absent or corrupt.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let prefs: TrackingPrefs = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(
                        "{}",
                        StorageError::Corrupt(format!("{}: {}", path.display(), e))
                    );
                    TrackingPrefs::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TrackingPrefs::default(),
            Err(e) => {
                return Err(StorageError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        tracing::debug!("Tracking flag loaded: {}", prefs.is_tracking);
        Ok(Self {
            path: path.to_path_buf(),
            prefs,
        })
    }

    pub fn is_tracking(&self) -> bool {
        self.prefs.is_tracking
    }

    pub fn prefs(&self) -> &TrackingPrefs {
        &self.prefs
    }

    /// Persist the flag. The in-memory value only changes once the write succeeds.
    pub fn set_tracking(&mut self, is_tracking: bool) -> Result<(), StorageError> {
        let next = TrackingPrefs {
            is_tracking,
            updated_at: Some(Utc::now()),
        };
        self.write(&next)?;
        self.prefs = next;
        Ok(())
    }

    fn write(&self, prefs: &TrackingPrefs) -> Result<(), StorageError> {
        let write_err = |e: &dyn std::fmt::Display| StorageError::Write {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
        }
        let contents = serde_json::to_string_pretty(prefs).map_err(|e| write_err(&e))?;

        // Readers never see a partially written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| write_err(&e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| write_err(&e))?;
        Ok(())
    }
}
