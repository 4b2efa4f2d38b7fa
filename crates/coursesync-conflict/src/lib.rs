//! coursesync conflict - Filesystem-safe naming
//!
//! Provides:
//! - Sanitizing of remote names into portable file names
//! - Case-folded name indexes that keep sibling names unique on
//!   case-insensitive filesystems
//! - Suffix naming for renamed documents and versioned local copies
//!
//! ## Modules
//!
//! - [`sanitize`] - Illegal character stripping and case folding
//! - [`index`] - Per-folder name index resolving folder/document collisions
//! - [`namer`] - Timestamp, id and `_vN` suffixes

pub mod index;
pub mod namer;
pub mod sanitize;

pub use index::{FolderPlacement, NameIndex, Reservation};
pub use namer::{append_to_stem, timestamp_suffix, versioned_name};
pub use sanitize::{fold, is_default_folder, sanitize};
