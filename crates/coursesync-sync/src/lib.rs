//! coursesync sync - Build, update and sync pipeline
//!
//! Provides:
//! - Full discovery of the remote catalog into a snapshot tree
//! - Incremental "changed since" refreshes of an existing snapshot
//! - Reconciliation of a snapshot against the local filesystem
//!
//! Every entry point runs one bounded, dynamically growing fan-out of units
//! joined by a [`JoinBarrier`](barrier::JoinBarrier). Snapshots are only
//! persisted after a clean join.
//!
//! ## Modules
//!
//! - [`barrier`] - Dynamic-party join barrier
//! - [`builder`] - Full catalog traversal ([`TreeBuilder`])
//! - [`updater`] - Incremental refresh ([`TreeUpdater`])
//! - [`syncer`] - Local reconciliation and downloads ([`TreeSyncer`])
//! - [`template`] - Directory layout placeholders ([`PathTemplate`])
//! - [`filesystem`] - Local file probing, versioning and atomic writes
//! - [`store`] - JSON file snapshot store ([`JsonSnapshotStore`])

pub mod barrier;
pub mod builder;
mod discovery;
pub mod filesystem;
mod run;
pub mod store;
pub mod syncer;
pub mod template;
mod tree;
pub mod updater;

pub use builder::TreeBuilder;
pub use run::{AbortReason, ProgressFn, SyncServices};
pub use store::JsonSnapshotStore;
pub use syncer::TreeSyncer;
pub use template::{PathTemplate, TemplateError};
pub use updater::TreeUpdater;

use coursesync_core::ports::CatalogError;
use thiserror::Error;

/// Fatal failures of a pipeline run
///
/// Recoverable remote failures and aborts never surface here; they prune
/// nodes or end the run early with a count.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local filesystem mutation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog produced a response it never should have
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The snapshot could not be persisted
    #[error("Snapshot store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The configured path template is invalid
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}
