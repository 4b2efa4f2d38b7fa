//! coursesync core - Snapshot tree model and collaborator ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Snapshot`, `SemesterNode`, `CourseNode`, `FolderNode`, `DocumentNode`
//! - **Port definitions** - Traits for adapters: `CatalogApi`, `CredentialProvider`, `SnapshotStore`
//! - **Configuration** - YAML-backed settings for the sync pipeline
//!
//! # Architecture
//!
//! The domain module is plain data plus lookup helpers, with no I/O.
//! Ports define trait interfaces that adapter crates implement; the
//! orchestration in `coursesync-sync` only talks to remote and storage
//! collaborators through them.

pub mod config;
pub mod domain;
pub mod ports;
