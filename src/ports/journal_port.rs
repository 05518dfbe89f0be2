//! Trade journal port.

use crate::domain::error::EngineError;
use crate::domain::journal::JournalEntry;

pub trait JournalPort {
    fn append(&mut self, entry: &JournalEntry) -> Result<(), EngineError>;
}
