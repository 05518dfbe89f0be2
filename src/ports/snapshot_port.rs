//! Dashboard snapshot publication port.

use crate::domain::error::EngineError;
use crate::domain::snapshot::CycleSnapshot;

pub trait SnapshotPort {
    fn publish(&mut self, snapshot: &CycleSnapshot) -> Result<(), EngineError>;
}
