//! Per-folder name index
//!
//! Every folder scope owns one [`NameIndex`]. It maps case-folded names to
//! the node that reserved them and decides, at insertion time, which name a
//! new folder or document is stored under:
//!
//! - **Default folder**: produces no node; its children land in the
//!   parent's scope.
//! - **Folder vs. folder**: same-name folders merge into one scope.
//! - **Folder vs. document**: the folder is renamed to `<name>_<folderId>`.
//! - **Document vs. anything**: the document is renamed with its change
//!   timestamp, then with its id.
//!
//! The index is generic over the scope handle `S` that a folder
//! reservation carries (e.g. an `Arc` to the folder's own live state), so
//! a merge can hand the caller the existing scope to populate.
//!
//! Callers serialize access per folder; the index itself is not
//! synchronized.

use std::collections::HashMap;

use tracing::debug;

use crate::namer::{append_to_stem, timestamp_suffix};
use crate::sanitize::{fold, is_default_folder, sanitize};

/// Owner of a reserved name
#[derive(Debug, Clone)]
pub enum Reservation<S> {
    Folder { id: String, name: String, scope: S },
    Document { id: String, name: String },
}

impl<S> Reservation<S> {
    /// The stored (sanitized, possibly renamed) name
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::Document { name, .. } => name,
        }
    }
}

/// Where a folder's contents go
#[derive(Debug, Clone)]
pub enum FolderPlacement<S> {
    /// The default folder: its children belong to the scope owning this index
    MergeIntoParent,
    /// A new folder node stored under `name`
    Created { name: String, scope: S },
    /// A folder with the same case-folded name already exists; populate its scope
    Merged { name: String, scope: S },
}

/// Case-folded name index of one folder scope
#[derive(Debug, Clone)]
pub struct NameIndex<S> {
    entries: HashMap<String, Reservation<S>>,
}

impl<S> Default for NameIndex<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S: Clone> NameIndex<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a name is taken under case folding
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    pub fn get(&self, name: &str) -> Option<&Reservation<S>> {
        self.entries.get(&fold(name))
    }

    // ========================================================================
    // Seeding from already-placed nodes
    // ========================================================================

    /// Records a folder that already carries a resolved name
    pub fn seed_folder(&mut self, id: impl Into<String>, name: &str, scope: S) {
        self.entries.insert(
            fold(name),
            Reservation::Folder {
                id: id.into(),
                name: name.to_string(),
                scope,
            },
        );
    }

    /// Records a document that already carries a resolved name
    pub fn seed_document(&mut self, id: impl Into<String>, name: &str) {
        self.entries.insert(
            fold(name),
            Reservation::Document {
                id: id.into(),
                name: name.to_string(),
            },
        );
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Decides where a remote folder's contents go.
    ///
    /// `make_scope` is only invoked when a new folder node is created and
    /// receives the final stored name.
    pub fn place_folder(
        &mut self,
        id: &str,
        name: &str,
        default_folder: &str,
        make_scope: impl FnOnce(&str) -> S,
    ) -> FolderPlacement<S> {
        if is_default_folder(name, default_folder) {
            debug!(folder_id = id, "Merging default folder into parent");
            return FolderPlacement::MergeIntoParent;
        }

        let mut candidate = sanitize(name);
        while let Some(Reservation::Document { .. }) = self.entries.get(&fold(&candidate)) {
            let renamed = format!("{candidate}_{id}");
            debug!(folder_id = id, from = %candidate, to = %renamed, "Folder name taken by a document");
            candidate = renamed;
        }

        let key = fold(&candidate);
        if let Some(Reservation::Folder { name, scope, .. }) = self.entries.get(&key) {
            debug!(folder_id = id, name = %name, "Merging same-name folder");
            return FolderPlacement::Merged {
                name: name.clone(),
                scope: scope.clone(),
            };
        }

        let scope = make_scope(&candidate);
        self.entries.insert(
            key,
            Reservation::Folder {
                id: id.to_string(),
                name: candidate.clone(),
                scope: scope.clone(),
            },
        );
        FolderPlacement::Created {
            name: candidate,
            scope,
        }
    }

    /// Reserves a name for a document and returns the stored name.
    ///
    /// Tries, in order: the sanitized name, the name with the change
    /// timestamp appended, the name with the document id appended.
    pub fn place_document(&mut self, id: &str, name: &str, changed: i64) -> String {
        let base = sanitize(name);
        let candidates = [
            base.clone(),
            append_to_stem(&base, &format!("_{}", timestamp_suffix(changed))),
            append_to_stem(&base, &format!("_{id}")),
        ];

        let chosen = candidates
            .into_iter()
            .find(|c| !self.entries.contains_key(&fold(c)))
            .unwrap_or_else(|| {
                // Only reachable when other documents already took the id-suffixed name.
                (2u32..)
                    .map(|n| append_to_stem(&base, &format!("_{id}_{n}")))
                    .find(|c| !self.entries.contains_key(&fold(c)))
                    .unwrap_or_else(|| format!("{base}_{id}"))
            });

        if chosen != base {
            debug!(document_id = id, from = %base, to = %chosen, "Renamed colliding document");
        }

        self.seed_document(id, &chosen);
        chosen
    }

    /// Frees `name` if the node with `id` holds it
    pub fn release(&mut self, id: &str, name: &str) -> bool {
        let key = fold(name);
        let held_by_id = match self.entries.get(&key) {
            Some(Reservation::Document { id: held, .. })
            | Some(Reservation::Folder { id: held, .. }) => held == id,
            None => false,
        };
        if held_by_id {
            self.entries.remove(&key);
        }
        held_by_id
    }
}
