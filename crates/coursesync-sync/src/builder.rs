//! Full catalog traversal
//!
//! The [`TreeBuilder`] discovers every visible semester, course, folder and
//! document from scratch and persists the resulting snapshot, but only if
//! the run joined cleanly.

use std::sync::Arc;

use tracing::{info, warn};

use crate::discovery::discover_semesters;
use crate::run::{RunContext, RunOutcome, SyncServices};
use crate::tree::LiveSnapshot;
use crate::SyncError;

/// Builds a fresh snapshot from the remote catalog
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    services: SyncServices,
}

impl TreeBuilder {
    pub fn new(services: SyncServices) -> Self {
        Self { services }
    }

    /// Runs one full discovery and returns the number of courses found.
    ///
    /// After an abort (shutdown, rejected bearer, lost connection) nothing
    /// is persisted and the number of courses registered so far is
    /// returned.
    ///
    /// # Errors
    /// Returns an error on a fatal catalog response or when the snapshot
    /// cannot be saved.
    #[tracing::instrument(skip(self))]
    pub async fn build(&self) -> Result<usize, SyncError> {
        if self.services.shutdown.is_cancelled() {
            info!("Shutdown requested, skipping build");
            return Ok(0);
        }

        let run = RunContext::new(&self.services);
        if !run.is_authenticated() {
            warn!("No bearer held, skipping build");
            return Ok(0);
        }

        info!("Starting full build");
        let tree = Arc::new(LiveSnapshot::new());
        run.spawn(discover_semesters(Arc::clone(&run), Arc::clone(&tree)));

        match run.join().await {
            RunOutcome::Completed => {
                let snapshot = tree.to_snapshot();
                run.store().save(&snapshot).await.map_err(SyncError::Store)?;
                info!(
                    semesters = snapshot.semesters.len(),
                    courses = snapshot.course_count(),
                    "Build complete, snapshot saved"
                );
                Ok(run.items())
            }
            RunOutcome::Aborted(reason) => {
                warn!(?reason, courses = run.items(), "Build aborted, snapshot not saved");
                Ok(run.items())
            }
            RunOutcome::Failed(err) => Err(err),
        }
    }
}
