//! Local reconciliation
//!
//! The [`TreeSyncer`] walks a snapshot against the mirror directory. For
//! every document it decides between three actions:
//!
//! - **Create**: nothing on disk, download it.
//! - **Replace**: size or mtime differ from the node; download it again and
//!   keep the old file as `_vN` (unless `overwrite` is set). The old file is
//!   only moved once the new content is on disk.
//! - **Skip**: size and mtime match exactly.
//!
//! Downloads run as units of one run. Documents the catalog reports gone are
//! pruned from the snapshot once the run joined cleanly.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use coursesync_conflict::{is_default_folder, sanitize};
use coursesync_core::domain::{DocumentNode, FolderNode, Snapshot};
use tracing::{debug, info, warn};

use crate::filesystem::{self, LocalFileState};
use crate::run::{RunContext, RunOutcome, SyncServices};
use crate::template::PathTemplate;
use crate::SyncError;

/// Per-document reconciliation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Replace,
    Skip,
}

impl Action {
    fn decide(local: Option<&LocalFileState>, document: &DocumentNode) -> Self {
        match local {
            None => Self::Create,
            Some(state) if state.matches(document) => Self::Skip,
            Some(_) => Self::Replace,
        }
    }
}

/// Ids of documents the catalog reported gone during a run
type Vanished = Arc<Mutex<Vec<String>>>;

/// Mirrors a snapshot into the local filesystem
#[derive(Debug, Clone)]
pub struct TreeSyncer {
    services: SyncServices,
    template: PathTemplate,
    root: PathBuf,
}

impl TreeSyncer {
    /// # Errors
    /// Returns [`SyncError::Template`] when the configured path template
    /// contains an unknown placeholder or no segments at all.
    pub fn new(services: SyncServices) -> Result<Self, SyncError> {
        let template = PathTemplate::parse(&services.config.sync.path_template)?;
        let root = expand_home(&services.config.sync.root);
        Ok(Self {
            services,
            template,
            root,
        })
    }

    /// [`sync`](Self::sync) with the configured semester selection
    pub async fn sync_configured(&self, snapshot: &mut Snapshot) -> Result<usize, SyncError> {
        let include_all = self.services.config.sync.include_all_semesters;
        self.sync(snapshot, include_all).await
    }

    /// Reconciles the mirror with `snapshot` and returns the number of
    /// downloads scheduled.
    ///
    /// Only semesters running right now are considered unless
    /// `include_all_semesters` is set.
    ///
    /// # Errors
    /// Returns an error when a local filesystem operation fails, on a fatal
    /// catalog response, or when the pruned snapshot cannot be saved.
    #[tracing::instrument(skip(self, snapshot), fields(root = %self.root.display()))]
    pub async fn sync(
        &self,
        snapshot: &mut Snapshot,
        include_all_semesters: bool,
    ) -> Result<usize, SyncError> {
        if self.services.shutdown.is_cancelled() {
            info!("Shutdown requested, skipping sync");
            return Ok(0);
        }

        let run = RunContext::new(&self.services);
        if !run.is_authenticated() {
            warn!("No bearer held, skipping sync");
            return Ok(0);
        }

        info!("Starting sync");
        let vanished: Vanished = Arc::default();
        if let Err(e) = self
            .schedule(&run, snapshot, include_all_semesters, &vanished)
            .await
        {
            run.fail(SyncError::Io(e));
        }

        match run.join().await {
            RunOutcome::Completed => {
                let gone = std::mem::take(
                    &mut *vanished.lock().unwrap_or_else(PoisonError::into_inner),
                );
                for id in &gone {
                    snapshot.remove_document(id);
                }
                if run.is_dirty() {
                    run.store().save(snapshot).await.map_err(SyncError::Store)?;
                    info!(pruned = gone.len(), "Snapshot saved after pruning");
                }
                info!(downloads = run.items(), "Sync complete");
                Ok(run.items())
            }
            RunOutcome::Aborted(reason) => {
                warn!(?reason, downloads = run.items(), "Sync aborted");
                Ok(run.items())
            }
            RunOutcome::Failed(err) => Err(err),
        }
    }

    /// Walks the selected courses, creating directories and scheduling
    /// downloads. Stops early once the run is stopped.
    async fn schedule(
        &self,
        run: &Arc<RunContext>,
        snapshot: &Snapshot,
        include_all_semesters: bool,
        vanished: &Vanished,
    ) -> io::Result<()> {
        let now = run.started_at();
        for semester in &snapshot.semesters {
            if !include_all_semesters && !semester.contains(now) {
                debug!(semester_id = %semester.id, "Semester not current, skipping");
                continue;
            }
            for course in &semester.courses {
                if run.is_stopped() {
                    return Ok(());
                }
                let dir = self.root.join(self.template.resolve(semester, course));
                debug!(course_id = %course.id, dir = %dir.display(), "Reconciling course");
                self.walk(run, &course.root, dir, vanished).await?;
            }
        }
        Ok(())
    }

    async fn walk(
        &self,
        run: &Arc<RunContext>,
        root: &FolderNode,
        dir: PathBuf,
        vanished: &Vanished,
    ) -> io::Result<()> {
        let sentinel = run.default_folder();
        let mut pending = vec![(root, dir)];

        while let Some((folder, dir)) = pending.pop() {
            if run.is_stopped() {
                return Ok(());
            }
            tokio::fs::create_dir_all(&dir).await?;

            for child in folder.folders.iter().rev() {
                let child_dir = if is_default_folder(&child.name, sentinel) {
                    dir.clone()
                } else {
                    dir.join(sanitize(&child.name))
                };
                pending.push((child, child_dir));
            }

            for document in &folder.documents {
                if run.is_stopped() {
                    return Ok(());
                }
                self.reconcile(run, document, dir.join(&document.name), vanished)
                    .await?;
            }
        }
        Ok(())
    }

    async fn reconcile(
        &self,
        run: &Arc<RunContext>,
        document: &DocumentNode,
        path: PathBuf,
        vanished: &Vanished,
    ) -> io::Result<()> {
        let local = filesystem::probe(&path).await?;
        let action = Action::decide(local.as_ref(), document);
        debug!(document_id = %document.id, path = %path.display(), ?action, "Reconciled document");

        let keep_previous = match action {
            Action::Skip => return Ok(()),
            Action::Replace => !self.services.config.sync.overwrite,
            Action::Create => false,
        };

        let job = Download {
            document: document.clone(),
            path,
            keep_previous,
        };
        if run.spawn(download(Arc::clone(run), job, Arc::clone(vanished))) {
            run.count_item();
        }
        Ok(())
    }
}

/// One scheduled download
struct Download {
    document: DocumentNode,
    path: PathBuf,
    /// Move an existing local file to `_vN` instead of overwriting it
    keep_previous: bool,
}

async fn download(run: Arc<RunContext>, job: Download, vanished: Vanished) {
    let Download {
        document,
        path,
        keep_previous,
    } = job;
    if run.is_stopped() {
        return;
    }
    let result = run.catalog().download_document(&document.id).await;
    if run.is_stopped() {
        return;
    }

    match result {
        Ok(stream) => {
            let written =
                filesystem::write_document(&path, stream, document.changed, keep_previous).await;
            if let Err(e) = written {
                run.fail(SyncError::Io(e));
                return;
            }
        }
        Err(e) if e.is_recoverable() => {
            warn!(document_id = %document.id, error = %e, "Document vanished, pruning");
            vanished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(document.id.clone());
            run.mark_dirty();
        }
        Err(e) => run.abort_on(e, "download_document"),
    }
    run.report(&document.name);
}

/// Expands a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
