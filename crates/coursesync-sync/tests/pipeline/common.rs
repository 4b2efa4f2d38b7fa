//! Shared fakes for pipeline integration tests
//!
//! Provides an in-memory catalog with programmable failures, a credential
//! holder that counts invalidations, and a snapshot store that counts saves.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coursesync_core::config::ConfigBuilder;
use coursesync_core::domain::{EpochSeconds, Snapshot};
use coursesync_core::ports::{
    CatalogApi, CatalogError, CatalogResult, CredentialProvider, DocumentStream, FolderContents,
    RemoteCourse, RemoteDocument, RemoteFolder, RemoteSemester, SnapshotStore,
};
use coursesync_sync::SyncServices;

pub const DEFAULT_FOLDER: &str = "Allgemeiner Dateiordner";

/// A semester that is always current
pub const ALWAYS_BEGIN: EpochSeconds = 0;
pub const ALWAYS_END: EpochSeconds = 4_102_444_800;

// ============================================================================
// FakeCatalog
// ============================================================================

/// Failure a call is programmed to return
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Unauthorized,
    Forbidden,
    NotFound,
    Connection,
    Fatal,
}

impl Fail {
    fn to_error(self, key: &str) -> CatalogError {
        match self {
            Self::Unauthorized => CatalogError::Unauthorized,
            Self::Forbidden => CatalogError::Forbidden(key.to_string()),
            Self::NotFound => CatalogError::NotFound(key.to_string()),
            Self::Connection => CatalogError::ConnectionFailed("connection reset".into()),
            Self::Fatal => CatalogError::Fatal(anyhow::anyhow!("malformed response for {key}")),
        }
    }
}

#[derive(Default)]
struct CatalogState {
    semesters: Vec<RemoteSemester>,
    courses: HashMap<String, Vec<RemoteCourse>>,
    /// Keyed by `(course id, folder id)`; `None` is the top folder
    listings: HashMap<(String, Option<String>), FolderContents>,
    changed: HashMap<String, Vec<RemoteDocument>>,
    content: HashMap<String, Vec<u8>>,
    failures: HashMap<String, Fail>,
}

/// In-memory catalog
///
/// Failure keys: `semesters`, `courses:<semester>`, `folder:<course>:<folder|top>`,
/// `changed:<course>`, `download:<document>`.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
    listings: AtomicUsize,
    downloads: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn semester(&self, id: &str, title: &str, begin: EpochSeconds, end: EpochSeconds) {
        let mut state = self.state.lock().unwrap();
        state.semesters.push(RemoteSemester {
            id: id.into(),
            title: title.into(),
            begin,
            end,
        });
        state.courses.entry(id.into()).or_default();
    }

    pub fn course(&self, semester_id: &str, id: &str, title: &str, type_code: i32) {
        let mut state = self.state.lock().unwrap();
        state
            .courses
            .entry(semester_id.into())
            .or_default()
            .push(RemoteCourse {
                id: id.into(),
                title: title.into(),
                start: 0,
                duration: 0,
                type_code,
            });
        state.listings.entry((id.into(), None)).or_default();
    }

    /// Adds a folder below `parent` (`None` = top folder)
    pub fn folder(&self, course_id: &str, parent: Option<&str>, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .listings
            .entry((course_id.into(), parent.map(String::from)))
            .or_default()
            .folders
            .push(RemoteFolder {
                id: id.into(),
                owner_id: None,
                name: name.into(),
                created: 0,
                changed: 0,
            });
        state
            .listings
            .entry((course_id.into(), Some(id.into())))
            .or_default();
    }

    /// Adds a document to a folder listing and returns it
    pub fn document(
        &self,
        course_id: &str,
        folder: Option<&str>,
        id: &str,
        name: &str,
        changed: EpochSeconds,
        bytes: &[u8],
    ) -> RemoteDocument {
        let document = remote_document(course_id, folder, id, name, changed, bytes.len() as u64);
        let mut state = self.state.lock().unwrap();
        state
            .listings
            .entry((course_id.into(), folder.map(String::from)))
            .or_default()
            .documents
            .push(document.clone());
        state.content.insert(id.into(), bytes.to_vec());
        document
    }

    /// Replaces a document's content and metadata everywhere it is listed
    pub fn modify(&self, id: &str, changed: EpochSeconds, bytes: &[u8]) -> RemoteDocument {
        let mut state = self.state.lock().unwrap();
        let mut updated = None;
        for contents in state.listings.values_mut() {
            for document in contents.documents.iter_mut().filter(|d| d.id == id) {
                document.changed = changed;
                document.size = bytes.len() as u64;
                updated = Some(document.clone());
            }
        }
        state.content.insert(id.into(), bytes.to_vec());
        updated.expect("document is listed")
    }

    /// Documents reported by the next `list_changed_documents(course_id, _)`
    pub fn report_changed(&self, course_id: &str, documents: Vec<RemoteDocument>) {
        self.state
            .lock()
            .unwrap()
            .changed
            .insert(course_id.into(), documents);
    }

    pub fn fail(&self, key: &str, fail: Fail) {
        self.state.lock().unwrap().failures.insert(key.into(), fail);
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str) -> CatalogResult<()> {
        match self.state.lock().unwrap().failures.get(key) {
            Some(fail) => Err(fail.to_error(key)),
            None => Ok(()),
        }
    }
}

/// The id the fake uses for a course's top folder
pub fn top_folder_id(course_id: &str) -> String {
    format!("{course_id}-top")
}

pub fn remote_document(
    course_id: &str,
    folder: Option<&str>,
    id: &str,
    name: &str,
    changed: EpochSeconds,
    size: u64,
) -> RemoteDocument {
    RemoteDocument {
        id: id.into(),
        folder_id: folder.map_or_else(|| top_folder_id(course_id), String::from),
        owner_id: Some("u1".into()),
        name: name.into(),
        description: String::new(),
        changed,
        size,
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_semesters(&self) -> CatalogResult<Vec<RemoteSemester>> {
        self.check("semesters")?;
        Ok(self.state.lock().unwrap().semesters.clone())
    }

    async fn list_courses(&self, semester_id: &str) -> CatalogResult<Vec<RemoteCourse>> {
        self.check(&format!("courses:{semester_id}"))?;
        self.state
            .lock()
            .unwrap()
            .courses
            .get(semester_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(semester_id.into()))
    }

    async fn list_folder_contents(
        &self,
        course_id: &str,
        folder_id: Option<&str>,
    ) -> CatalogResult<FolderContents> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let key = format!("folder:{course_id}:{}", folder_id.unwrap_or("top"));
        self.check(&key)?;
        // Yield so sibling units genuinely interleave.
        tokio::task::yield_now().await;
        self.state
            .lock()
            .unwrap()
            .listings
            .get(&(course_id.to_string(), folder_id.map(String::from)))
            .cloned()
            .ok_or(CatalogError::NotFound(key))
    }

    async fn list_changed_documents(
        &self,
        course_id: &str,
        _since: EpochSeconds,
    ) -> CatalogResult<Vec<RemoteDocument>> {
        self.check(&format!("changed:{course_id}"))?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .changed
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn download_document(&self, document_id: &str) -> CatalogResult<DocumentStream> {
        self.check(&format!("download:{document_id}"))?;
        let bytes = self
            .state
            .lock()
            .unwrap()
            .content
            .get(document_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(document_id.into()))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(Cursor::new(bytes)))
    }
}

// ============================================================================
// FakeCredentials
// ============================================================================

pub struct FakeCredentials {
    bearer: Mutex<Option<String>>,
    invalidations: AtomicUsize,
}

impl FakeCredentials {
    pub fn authenticated() -> Arc<Self> {
        Arc::new(Self {
            bearer: Mutex::new(Some("bearer-token".into())),
            invalidations: AtomicUsize::new(0),
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self {
            bearer: Mutex::new(None),
            invalidations: AtomicUsize::new(0),
        })
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for FakeCredentials {
    fn current_bearer(&self) -> Option<String> {
        self.bearer.lock().unwrap().clone()
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.bearer.lock().unwrap() = None;
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.saved())
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        *self.saved.lock().unwrap() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Fakes plus the services built from them
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub credentials: Arc<FakeCredentials>,
    pub store: Arc<MemoryStore>,
    pub services: SyncServices,
}

impl Harness {
    pub fn new(root: &Path) -> Self {
        Self::with_config(root, |builder| builder)
    }

    pub fn with_config(root: &Path, configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let catalog = FakeCatalog::new();
        let credentials = FakeCredentials::authenticated();
        let store = MemoryStore::new();
        let config = configure(
            ConfigBuilder::new()
                .sync_root(root.to_path_buf())
                .snapshot_file(root.join("snapshot.json"))
                .workers(4),
        )
        .build();
        let services = SyncServices::new(
            catalog.clone(),
            credentials.clone(),
            store.clone(),
            config,
        );
        Self {
            catalog,
            credentials,
            store,
            services,
        }
    }
}

/// One current semester with the lecture/exercise pair used across tests:
///
/// ```text
/// c1 "Analysis"
///   Allgemeiner Dateiordner (f0) ─ intro.pdf (d1)
///   Slides (f1) ─ week1.pdf (d2)
///   syllabus.txt (d3)
/// c2 "Übung zu Analysis"
///   sheet1.pdf (d4)
/// ```
pub fn seed_catalog(catalog: &FakeCatalog) {
    catalog.semester("s1", "WS 2024/25", ALWAYS_BEGIN, ALWAYS_END);
    catalog.course("s1", "c1", "Analysis", 1);
    catalog.course("s1", "c2", "Übung zu Analysis", 3);

    catalog.folder("c1", None, "f0", DEFAULT_FOLDER);
    catalog.document("c1", Some("f0"), "d1", "intro.pdf", 1_700_000_100, b"intro");
    catalog.folder("c1", None, "f1", "Slides");
    catalog.document("c1", Some("f1"), "d2", "week1.pdf", 1_700_000_200, b"week one");
    catalog.document("c1", None, "d3", "syllabus.txt", 1_700_000_300, b"syllabus");

    catalog.document("c2", None, "d4", "sheet1.pdf", 1_700_000_400, b"sheet");
}
