//! Snapshot tree
//!
//! The persisted mirror of the remote catalog:
//! semesters → courses → nested folders → documents.
//!
//! ## Invariants
//!
//! - Semester ids are unique within a snapshot.
//! - Children keep the order in which they were discovered remotely.
//! - Within one folder, no two folders and no folder/document pair share
//!   the same case-folded, sanitized name. The name conflict resolver
//!   enforces this when nodes are inserted; nothing here re-checks it.
//! - A document's `changed` timestamp is the mtime its local copy must
//!   carry. It is the only signal for remote modification.
//!
//! Parent lookups (folder index, document owner) are deliberately not
//! stored on the nodes; orchestrators build auxiliary maps per run.

use serde::{Deserialize, Serialize};

use super::course_type::CourseType;

/// Seconds since the Unix epoch, as reported by the remote catalog
pub type EpochSeconds = i64;

// ============================================================================
// Snapshot
// ============================================================================

/// Root of the persisted tree; the unit of persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub semesters: Vec<SemesterNode>,
}

impl Snapshot {
    /// Creates an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of courses across all semesters
    pub fn course_count(&self) -> usize {
        self.semesters.iter().map(|s| s.courses.len()).sum()
    }

    /// Looks up a course by its remote id
    pub fn find_course(&self, course_id: &str) -> Option<&CourseNode> {
        self.semesters
            .iter()
            .flat_map(|s| s.courses.iter())
            .find(|c| c.id == course_id)
    }

    /// Removes a course from whichever semester holds it
    pub fn remove_course(&mut self, course_id: &str) -> Option<CourseNode> {
        self.semesters
            .iter_mut()
            .find_map(|s| s.remove_course(course_id))
    }

    /// Removes a document anywhere in the snapshot
    ///
    /// Document ids are globally unique remotely, so the first match wins.
    pub fn remove_document(&mut self, document_id: &str) -> Option<DocumentNode> {
        self.semesters
            .iter_mut()
            .flat_map(|s| s.courses.iter_mut())
            .find_map(|c| c.root.remove_document(document_id))
    }
}

// ============================================================================
// SemesterNode
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterNode {
    pub id: String,
    pub title: String,
    pub begin: EpochSeconds,
    pub end: EpochSeconds,
    #[serde(default)]
    pub courses: Vec<CourseNode>,
}

impl SemesterNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, begin: i64, end: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            begin,
            end,
            courses: Vec::new(),
        }
    }

    /// Whether `at` falls within `[begin, end)`
    pub fn contains(&self, at: EpochSeconds) -> bool {
        self.begin <= at && at < self.end
    }

    pub fn remove_course(&mut self, course_id: &str) -> Option<CourseNode> {
        let pos = self.courses.iter().position(|c| c.id == course_id)?;
        Some(self.courses.remove(pos))
    }
}

// ============================================================================
// CourseNode
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseNode {
    pub id: String,
    pub title: String,
    pub start: EpochSeconds,
    pub duration: i64,
    /// Raw remote type code. Opaque: unknown values are kept as-is.
    pub type_code: i32,
    /// Lower bound for the next "changed since" query
    pub last_update: EpochSeconds,
    pub root: FolderNode,
}

impl CourseNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, type_code: i32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start: 0,
            duration: 0,
            type_code,
            last_update: 0,
            root: FolderNode::root(),
        }
    }

    /// The well-known type of this course, if its code has one
    pub fn course_type(&self) -> Option<CourseType> {
        CourseType::from_code(self.type_code)
    }
}

// ============================================================================
// FolderNode
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    /// `None` for the synthetic course root
    pub id: Option<String>,
    pub owner_id: Option<String>,
    /// Empty for the synthetic course root
    pub name: String,
    pub created: EpochSeconds,
    pub changed: EpochSeconds,
    /// Remote ids of folders whose contents were merged into this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub folders: Vec<FolderNode>,
    #[serde(default)]
    pub documents: Vec<DocumentNode>,
}

impl FolderNode {
    /// The synthetic root folder of a course
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether a remote folder id resolves to this node
    pub fn answers_to(&self, folder_id: &str) -> bool {
        self.id.as_deref() == Some(folder_id) || self.aliases.iter().any(|a| a == folder_id)
    }

    /// Visits this folder and every descendant folder, depth first
    pub fn walk_folders<'a>(&'a self, visit: &mut impl FnMut(&'a FolderNode)) {
        visit(self);
        for folder in &self.folders {
            folder.walk_folders(visit);
        }
    }

    /// Number of documents in this folder and all descendants
    pub fn document_count(&self) -> usize {
        let mut count = 0;
        self.walk_folders(&mut |f| count += f.documents.len());
        count
    }

    pub fn find_document(&self, document_id: &str) -> Option<&DocumentNode> {
        self.documents
            .iter()
            .find(|d| d.id == document_id)
            .or_else(|| {
                self.folders
                    .iter()
                    .find_map(|f| f.find_document(document_id))
            })
    }

    /// Removes a document from this folder or any descendant
    pub fn remove_document(&mut self, document_id: &str) -> Option<DocumentNode> {
        if let Some(pos) = self.documents.iter().position(|d| d.id == document_id) {
            return Some(self.documents.remove(pos));
        }
        self.folders
            .iter_mut()
            .find_map(|f| f.remove_document(document_id))
    }
}

// ============================================================================
// DocumentNode
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub owner_id: Option<String>,
    /// Stored (conflict-free, filesystem-safe) file name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Remote change time; doubles as the required local mtime
    pub changed: EpochSeconds,
    pub size: u64,
}

impl DocumentNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, changed: i64, size: u64) -> Self {
        Self {
            id: id.into(),
            owner_id: None,
            name: name.into(),
            description: String::new(),
            changed,
            size,
        }
    }
}
