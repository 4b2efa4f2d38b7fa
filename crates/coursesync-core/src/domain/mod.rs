//! Domain entities
//!
//! This module contains the persisted snapshot tree:
//! - Semesters, courses, folders and documents
//! - Course type codes and their well-known meanings

pub mod course_type;
pub mod tree;

// Re-export commonly used types
pub use course_type::CourseType;
pub use tree::{CourseNode, DocumentNode, EpochSeconds, FolderNode, SemesterNode, Snapshot};
