//! Writes the latest cycle snapshot to a JSON file for the dashboard.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::EngineError;
use crate::domain::snapshot::CycleSnapshot;
use crate::ports::snapshot_port::SnapshotPort;

pub struct JsonSnapshotAdapter {
    path: PathBuf,
}

impl JsonSnapshotAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotPort for JsonSnapshotAdapter {
    /// Replaces the file contents via a temp file so readers never see a
    /// half-written snapshot.
    fn publish(&mut self, snapshot: &CycleSnapshot) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| EngineError::Snapshot {
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
