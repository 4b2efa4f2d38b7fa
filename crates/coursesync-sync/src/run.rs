//! Per-run orchestration context
//!
//! Every public entry point (build, update, sync) creates one [`RunContext`].
//! It owns everything that is scoped to exactly one run:
//!
//! - the [`JoinBarrier`] all units of the run share,
//! - the bounded worker pool (a semaphore sized to the configured workers),
//! - the "stop pending" token, a child of the process-wide shutdown token,
//! - the dirty flag, the credential invalidation latch and the first fatal
//!   error.
//!
//! Units are spawned with [`RunContext::spawn`]. A stop (shutdown,
//! rejected bearer, lost connection, fatal error) terminates the barrier
//! and cancels the token; queued and in-flight units are dropped at their
//! next await point rather than drained.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use coursesync_core::config::Config;
use coursesync_core::domain::EpochSeconds;
use coursesync_core::ports::{CatalogApi, CatalogError, CredentialProvider, SnapshotStore};

use crate::barrier::{BarrierOutcome, JoinBarrier};
use crate::SyncError;

/// Best-effort progress callback, invoked with a label per completed unit
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// SyncServices
// ============================================================================

/// Collaborators shared by every run of the pipeline
///
/// Constructed once by the embedding application and handed to
/// [`TreeBuilder`](crate::builder::TreeBuilder),
/// [`TreeUpdater`](crate::updater::TreeUpdater) and
/// [`TreeSyncer`](crate::syncer::TreeSyncer).
#[derive(Clone)]
pub struct SyncServices {
    pub catalog: Arc<dyn CatalogApi>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub store: Arc<dyn SnapshotStore>,
    pub config: Arc<Config>,
    /// Process-wide abort request (e.g. SIGTERM)
    pub shutdown: CancellationToken,
    pub progress: Option<ProgressFn>,
}

impl SyncServices {
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn SnapshotStore>,
        config: Config,
    ) -> Self {
        Self {
            catalog,
            credentials,
            store,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
            progress: None,
        }
    }

    /// Ties runs to an externally owned shutdown token
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for SyncServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServices")
            .field("config", &self.config)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Run outcome
// ============================================================================

/// Why a run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Shutdown,
    Unauthorized,
    ConnectionFailed,
    Fatal,
}

/// Result of joining a run
#[derive(Debug)]
pub(crate) enum RunOutcome {
    Completed,
    Aborted(AbortReason),
    Failed(SyncError),
}

// ============================================================================
// RunContext
// ============================================================================

pub(crate) struct RunContext {
    services: SyncServices,
    barrier: JoinBarrier,
    permits: Semaphore,
    stop: CancellationToken,
    abort: OnceLock<AbortReason>,
    fatal: Mutex<Option<SyncError>>,
    dirty: AtomicBool,
    invalidated: AtomicBool,
    items: AtomicUsize,
    started_at: EpochSeconds,
}

impl RunContext {
    /// Creates the context with the orchestrating caller as the only party
    pub fn new(services: &SyncServices) -> Arc<Self> {
        let workers = services.config.concurrency.effective_workers();
        debug!(workers, "Creating run context");
        Arc::new(Self {
            stop: services.shutdown.child_token(),
            services: services.clone(),
            barrier: JoinBarrier::new(1),
            permits: Semaphore::new(workers),
            abort: OnceLock::new(),
            fatal: Mutex::new(None),
            dirty: AtomicBool::new(false),
            invalidated: AtomicBool::new(false),
            items: AtomicUsize::new(0),
            started_at: Utc::now().timestamp(),
        })
    }

    pub fn catalog(&self) -> &dyn CatalogApi {
        self.services.catalog.as_ref()
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.services.store.as_ref()
    }

    pub fn default_folder(&self) -> &str {
        &self.services.config.sync.default_folder_name
    }

    /// Wall-clock time the run started at
    pub fn started_at(&self) -> EpochSeconds {
        self.started_at
    }

    /// Either the process is shutting down or this run was stopped
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Whether a bearer is currently held
    pub fn is_authenticated(&self) -> bool {
        self.services.credentials.current_bearer().is_some()
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Counts one top-level item (course, download) registered by this run
    pub fn count_item(&self) {
        self.items.fetch_add(1, Ordering::AcqRel);
    }

    pub fn items(&self) -> usize {
        self.items.load(Ordering::Acquire)
    }

    /// Reports a completed unit to the progress callback
    pub fn report(&self, label: &str) {
        if let Some(progress) = &self.services.progress {
            progress(label);
        }
    }

    // ========================================================================
    // Worker pool
    // ========================================================================

    /// Registers a unit with the barrier and submits it to the pool.
    ///
    /// Returns `false`, dropping the unit, when the run is already stopped.
    pub fn spawn<F>(self: &Arc<Self>, unit: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_stopped() || !self.barrier.register(1) {
            return false;
        }

        let run = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = run.stop.cancelled() => {}
                _ = async {
                    if let Ok(_permit) = run.permits.acquire().await {
                        unit.await;
                    }
                } => {}
            }
            run.barrier.arrive();
        });
        true
    }

    /// Waits for every unit of the run, or for the run to be stopped
    pub async fn join(&self) -> RunOutcome {
        let released = tokio::select! {
            outcome = self.barrier.arrive_and_wait() => outcome,
            _ = self.stop.cancelled() => {
                self.barrier.force_terminate();
                BarrierOutcome::Terminated
            }
        };

        if let Some(err) = self.take_fatal() {
            return RunOutcome::Failed(err);
        }

        if released == BarrierOutcome::Completed && !self.is_stopped() {
            return RunOutcome::Completed;
        }

        // Abandon whatever is still queued or running.
        self.stop.cancel();
        let reason = self.abort.get().copied().unwrap_or(AbortReason::Shutdown);
        RunOutcome::Aborted(reason)
    }

    // ========================================================================
    // Failure handling
    // ========================================================================

    /// Stops the run after a non-recoverable catalog failure.
    ///
    /// A rejected bearer is invalidated at most once per run.
    pub fn abort_on(&self, err: CatalogError, context: &str) {
        match err {
            CatalogError::Unauthorized => {
                warn!(context, "Bearer rejected by the catalog, aborting run");
                if !self.invalidated.swap(true, Ordering::AcqRel) {
                    self.services.credentials.invalidate();
                }
                self.abort(AbortReason::Unauthorized);
            }
            CatalogError::ConnectionFailed(reason) => {
                warn!(context, %reason, "Catalog unreachable, aborting run");
                self.abort(AbortReason::ConnectionFailed);
            }
            CatalogError::Forbidden(_) | CatalogError::NotFound(_) => {
                debug!(context, error = %err, "Recoverable catalog failure");
            }
            CatalogError::Fatal(_) => self.fail(SyncError::Catalog(err)),
        }
    }

    /// Records a fatal error (first one wins) and stops the run
    pub fn fail(&self, err: SyncError) {
        error!(error = %err, "Fatal error, aborting run");
        {
            let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.abort(AbortReason::Fatal);
    }

    fn abort(&self, reason: AbortReason) {
        let _ = self.abort.set(reason);
        self.barrier.force_terminate();
        self.stop.cancel();
    }

    fn take_fatal(&self) -> Option<SyncError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
