//! Snapshot store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (file, database) and don't need domain-level classification.
//! - The serialization format is the adapter's business; the pipeline
//!   only reads and writes whole trees.

use crate::domain::Snapshot;

/// Port trait for snapshot persistence
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the persisted snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet or when the
    /// stored data cannot be decoded; callers then fall back to a full build.
    async fn load(&self) -> anyhow::Result<Option<Snapshot>>;

    /// Replaces the persisted snapshot
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}
