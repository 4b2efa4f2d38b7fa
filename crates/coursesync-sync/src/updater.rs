//! Incremental refresh
//!
//! The [`TreeUpdater`] patches an existing snapshot with the documents each
//! course reports as changed since its stored `last_update`. A document in
//! a folder the snapshot does not know yet triggers a full rediscovery of
//! that course.
//!
//! `last_update` advances to the client's clock at run start. Clock skew
//! between client and catalog is not compensated for.

use std::sync::Arc;

use coursesync_core::domain::Snapshot;
use tracing::{debug, info, warn};

use crate::discovery::{folder_unit, FolderJob};
use crate::run::{RunContext, RunOutcome, SyncServices};
use crate::tree::{LiveCourse, LiveSemester, LiveSnapshot};
use crate::SyncError;

/// Applies "changed since" deltas to a snapshot
#[derive(Debug, Clone)]
pub struct TreeUpdater {
    services: SyncServices,
}

impl TreeUpdater {
    pub fn new(services: SyncServices) -> Self {
        Self { services }
    }

    /// Refreshes every course of `snapshot` in place and returns the number
    /// of courses checked.
    ///
    /// `snapshot` is only modified, and only persisted, when the run joins
    /// cleanly.
    ///
    /// # Errors
    /// Returns an error on a fatal catalog response or when the snapshot
    /// cannot be saved.
    #[tracing::instrument(skip_all, fields(courses = snapshot.course_count()))]
    pub async fn update(&self, snapshot: &mut Snapshot) -> Result<usize, SyncError> {
        if self.services.shutdown.is_cancelled() {
            info!("Shutdown requested, skipping update");
            return Ok(0);
        }

        let run = RunContext::new(&self.services);
        if !run.is_authenticated() {
            warn!("No bearer held, skipping update");
            return Ok(0);
        }

        info!("Starting incremental update");
        let tree = LiveSnapshot::from_snapshot(snapshot);
        for semester in tree.semesters() {
            for course in semester.courses() {
                let unit = update_course(Arc::clone(&run), Arc::clone(&semester), course);
                if run.spawn(unit) {
                    run.count_item();
                }
            }
        }

        match run.join().await {
            RunOutcome::Completed => {
                *snapshot = tree.to_snapshot();
                if run.is_dirty() {
                    run.store().save(snapshot).await.map_err(SyncError::Store)?;
                    info!(courses = snapshot.course_count(), "Update complete, snapshot saved");
                } else {
                    info!("Update complete, nothing changed");
                }
                Ok(run.items())
            }
            RunOutcome::Aborted(reason) => {
                warn!(?reason, "Update aborted, snapshot left untouched");
                Ok(run.items())
            }
            RunOutcome::Failed(err) => Err(err),
        }
    }
}

async fn update_course(run: Arc<RunContext>, semester: Arc<LiveSemester>, course: Arc<LiveCourse>) {
    if run.is_stopped() {
        return;
    }
    let since = course.last_update();
    let result = run
        .catalog()
        .list_changed_documents(course.id(), since)
        .await;
    if run.is_stopped() {
        return;
    }

    match result {
        Ok(documents) => {
            debug!(course_id = course.id(), since, changed = documents.len(), "Fetched changes");
            let root = course.root();
            let folders = root.index();
            for remote in &documents {
                let Some(folder) = folders.get(&remote.folder_id) else {
                    info!(
                        course_id = course.id(),
                        folder_id = %remote.folder_id,
                        "Unknown folder, rediscovering course"
                    );
                    course.replace_root();
                    run.spawn(folder_unit(
                        Arc::clone(&run),
                        FolderJob::top(&semester, &course),
                    ));
                    break;
                };
                root.remove_document(&remote.id);
                folder.place_document(remote);
            }
            course.set_last_update(run.started_at());
            run.mark_dirty();
        }
        Err(e) if e.is_recoverable() => {
            warn!(course_id = course.id(), error = %e, "Course vanished, pruning");
            semester.remove_course(course.id());
            run.mark_dirty();
        }
        Err(e) => run.abort_on(e, "list_changed_documents"),
    }
    run.report(&course.title());
}
