//! Live tree shared by the units of one run
//!
//! While a run fans out, many units append to different parts of the same
//! tree. The persisted [`Snapshot`] is a plain owned tree, so a run works on
//! a live mirror of it instead: every folder sits behind its own lock
//! together with its [`NameIndex`], which serializes sibling placement per
//! parent scope. After a clean join the live tree is turned back into a
//! [`Snapshot`].
//!
//! Locks are only ever taken parent before child and never held across an
//! await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use coursesync_conflict::{FolderPlacement, NameIndex};
use coursesync_core::domain::{
    CourseNode, DocumentNode, EpochSeconds, FolderNode, SemesterNode, Snapshot,
};
use coursesync_core::ports::{RemoteDocument, RemoteFolder};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// LiveFolder
// ============================================================================

struct FolderState {
    /// Folder metadata; `folders`/`documents` stay empty here
    meta: FolderNode,
    names: NameIndex<Arc<LiveFolder>>,
    folders: Vec<Arc<LiveFolder>>,
    documents: Vec<DocumentNode>,
}

pub(crate) struct LiveFolder {
    state: Mutex<FolderState>,
}

impl LiveFolder {
    /// An empty synthetic course root
    pub fn root() -> Arc<Self> {
        Self::new(FolderNode::root())
    }

    fn new(mut meta: FolderNode) -> Arc<Self> {
        meta.folders.clear();
        meta.documents.clear();
        Arc::new(Self {
            state: Mutex::new(FolderState {
                meta,
                names: NameIndex::new(),
                folders: Vec::new(),
                documents: Vec::new(),
            }),
        })
    }

    /// Mirrors a persisted folder, seeding every name index from the
    /// already-placed children
    pub fn from_node(node: &FolderNode) -> Arc<Self> {
        let live = Self::new(node.clone());
        {
            let mut state = lock(&live.state);
            for child in &node.folders {
                let child_live = Self::from_node(child);
                let id = child.id.clone().unwrap_or_default();
                state.names.seed_folder(id, &child.name, Arc::clone(&child_live));
                state.folders.push(child_live);
            }
            for document in &node.documents {
                state.names.seed_document(document.id.clone(), &document.name);
                state.documents.push(document.clone());
            }
        }
        live
    }

    pub fn to_node(&self) -> FolderNode {
        let state = lock(&self.state);
        let mut node = state.meta.clone();
        node.folders = state.folders.iter().map(|f| f.to_node()).collect();
        node.documents = state.documents.clone();
        node
    }

    pub fn answers_to(&self, folder_id: &str) -> bool {
        lock(&self.state).meta.answers_to(folder_id)
    }

    /// Records that `folder_id` resolves to this folder
    pub fn adopt_alias(&self, folder_id: &str) {
        let mut state = lock(&self.state);
        if !state.meta.answers_to(folder_id) {
            state.meta.aliases.push(folder_id.to_string());
        }
    }

    /// Places a remote subfolder and returns the scope its contents go to.
    ///
    /// That scope is `self` for the default folder, an existing sibling for
    /// same-name folders, or a new child.
    pub fn place_folder(self: &Arc<Self>, remote: &RemoteFolder, default_folder: &str) -> Arc<Self> {
        let mut state = lock(&self.state);
        let placement = state
            .names
            .place_folder(&remote.id, &remote.name, default_folder, |name| {
                Self::new(FolderNode {
                    id: Some(remote.id.clone()),
                    owner_id: remote.owner_id.clone(),
                    name: name.to_string(),
                    created: remote.created,
                    changed: remote.changed,
                    ..FolderNode::default()
                })
            });

        match placement {
            FolderPlacement::MergeIntoParent => {
                if !state.meta.answers_to(&remote.id) {
                    state.meta.aliases.push(remote.id.clone());
                }
                Arc::clone(self)
            }
            FolderPlacement::Created { scope, .. } => {
                state.folders.push(Arc::clone(&scope));
                scope
            }
            FolderPlacement::Merged { scope, .. } => {
                scope.adopt_alias(&remote.id);
                scope
            }
        }
    }

    /// Places a document, replacing any document with the same id in this
    /// folder. Returns the stored name.
    pub fn place_document(&self, remote: &RemoteDocument) -> String {
        let mut state = lock(&self.state);
        if let Some(pos) = state.documents.iter().position(|d| d.id == remote.id) {
            let old = state.documents.remove(pos);
            state.names.release(&old.id, &old.name);
        }

        let name = state
            .names
            .place_document(&remote.id, &remote.name, remote.changed);
        state.documents.push(DocumentNode {
            id: remote.id.clone(),
            owner_id: remote.owner_id.clone(),
            name: name.clone(),
            description: remote.description.clone(),
            changed: remote.changed,
            size: remote.size,
        });
        name
    }

    /// Removes a document from this folder or any descendant
    pub fn remove_document(&self, document_id: &str) -> bool {
        let mut state = lock(&self.state);
        if let Some(pos) = state.documents.iter().position(|d| d.id == document_id) {
            let old = state.documents.remove(pos);
            state.names.release(&old.id, &old.name);
            return true;
        }
        state.folders.iter().any(|f| f.remove_document(document_id))
    }

    /// Drops `folder_id` after the remote reported it gone.
    ///
    /// A child node is only removed when no other remote folder was merged
    /// into it; otherwise just the id is forgotten.
    pub fn forget_folder(&self, folder_id: &str) {
        let mut state = lock(&self.state);
        state.meta.aliases.retain(|a| a != folder_id);

        let Some(pos) = state.folders.iter().position(|f| f.answers_to(folder_id)) else {
            return;
        };
        let child = Arc::clone(&state.folders[pos]);
        let mut child_state = lock(&child.state);
        child_state.meta.aliases.retain(|a| a != folder_id);
        if child_state.meta.id.as_deref() == Some(folder_id) && child_state.meta.aliases.is_empty()
        {
            let name = child_state.meta.name.clone();
            drop(child_state);
            state.folders.remove(pos);
            state.names.release(folder_id, &name);
            debug!(folder_id, name = %name, "Pruned vanished folder");
        }
    }

    /// Maps every folder id and alias in this subtree to its live folder
    pub fn index(self: &Arc<Self>) -> HashMap<String, Arc<Self>> {
        let mut index = HashMap::new();
        self.collect_index(&mut index);
        index
    }

    fn collect_index(self: &Arc<Self>, index: &mut HashMap<String, Arc<Self>>) {
        let state = lock(&self.state);
        for id in state.meta.id.iter().chain(state.meta.aliases.iter()) {
            index.insert(id.clone(), Arc::clone(self));
        }
        for child in &state.folders {
            child.collect_index(index);
        }
    }
}

// ============================================================================
// LiveCourse / LiveSemester / LiveSnapshot
// ============================================================================

pub(crate) struct LiveCourse {
    id: String,
    /// Course metadata; `root` is a placeholder
    meta: Mutex<CourseNode>,
    root: Mutex<Arc<LiveFolder>>,
}

impl LiveCourse {
    pub fn new(mut meta: CourseNode) -> Arc<Self> {
        let root = LiveFolder::from_node(&meta.root);
        meta.root = FolderNode::root();
        Arc::new(Self {
            id: meta.id.clone(),
            meta: Mutex::new(meta),
            root: Mutex::new(root),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> String {
        lock(&self.meta).title.clone()
    }

    pub fn last_update(&self) -> EpochSeconds {
        lock(&self.meta).last_update
    }

    pub fn set_last_update(&self, at: EpochSeconds) {
        lock(&self.meta).last_update = at;
    }

    pub fn root(&self) -> Arc<LiveFolder> {
        Arc::clone(&lock(&self.root))
    }

    /// Discards the course's folder tree and returns the fresh, empty root
    pub fn replace_root(&self) -> Arc<LiveFolder> {
        let root = LiveFolder::root();
        *lock(&self.root) = Arc::clone(&root);
        root
    }

    pub fn to_node(&self) -> CourseNode {
        let mut node = lock(&self.meta).clone();
        node.root = self.root().to_node();
        node
    }
}

pub(crate) struct LiveSemester {
    /// Semester metadata; `courses` stays empty here
    meta: SemesterNode,
    courses: Mutex<Vec<Arc<LiveCourse>>>,
}

impl LiveSemester {
    pub fn new(mut meta: SemesterNode) -> Arc<Self> {
        let courses = meta.courses.drain(..).map(LiveCourse::new).collect();
        Arc::new(Self {
            meta,
            courses: Mutex::new(courses),
        })
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn courses(&self) -> Vec<Arc<LiveCourse>> {
        lock(&self.courses).clone()
    }

    pub fn push_course(&self, course: Arc<LiveCourse>) {
        lock(&self.courses).push(course);
    }

    pub fn remove_course(&self, course_id: &str) -> bool {
        let mut courses = lock(&self.courses);
        let before = courses.len();
        courses.retain(|c| c.id() != course_id);
        courses.len() != before
    }

    pub fn to_node(&self) -> SemesterNode {
        let mut node = self.meta.clone();
        node.courses = self.courses().iter().map(|c| c.to_node()).collect();
        node
    }
}

#[derive(Default)]
pub(crate) struct LiveSnapshot {
    semesters: Mutex<Vec<Arc<LiveSemester>>>,
}

impl LiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let semesters = snapshot
            .semesters
            .iter()
            .cloned()
            .map(LiveSemester::new)
            .collect();
        Self {
            semesters: Mutex::new(semesters),
        }
    }

    pub fn semesters(&self) -> Vec<Arc<LiveSemester>> {
        lock(&self.semesters).clone()
    }

    /// Appends a semester unless one with the same id is already present
    pub fn push_semester(&self, semester: SemesterNode) -> Option<Arc<LiveSemester>> {
        let mut semesters = lock(&self.semesters);
        if semesters.iter().any(|s| s.id() == semester.id) {
            debug!(semester_id = %semester.id, "Skipping duplicate semester");
            return None;
        }
        let live = LiveSemester::new(semester);
        semesters.push(Arc::clone(&live));
        Some(live)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            semesters: self.semesters().iter().map(|s| s.to_node()).collect(),
        }
    }
}
