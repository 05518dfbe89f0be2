//! Append-only CSV trade journal.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::error::EngineError;
use crate::domain::journal::JournalEntry;
use crate::ports::journal_port::JournalPort;

pub struct CsvJournalAdapter {
    path: PathBuf,
}

impl CsvJournalAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record back, oldest first. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, EngineError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| EngineError::Journal {
            reason: format!("failed to open {}: {}", self.path.display(), e),
        })?;
        rdr.deserialize()
            .map(|row| {
                row.map_err(|e| EngineError::Journal {
                    reason: format!("invalid journal row: {}", e),
                })
            })
            .collect()
    }
}

impl JournalPort for CsvJournalAdapter {
    fn append(&mut self, entry: &JournalEntry) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        wtr.serialize(entry).map_err(|e| EngineError::Journal {
            reason: format!("failed to write {}: {}", self.path.display(), e),
        })?;
        wtr.flush()?;
        Ok(())
    }
}
