//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! sync pipeline. Ports are interfaces that the orchestration depends on,
//! but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`CatalogApi`] - Typed accessors for the remote course catalog
//! - [`CredentialProvider`] - Current bearer token and its invalidation
//! - [`SnapshotStore`] - Loading and saving the persisted snapshot

pub mod catalog;
pub mod credentials;
pub mod snapshot_store;

pub use catalog::{
    CatalogApi, CatalogError, CatalogResult, DocumentStream, FolderContents, RemoteCourse,
    RemoteDocument, RemoteFolder, RemoteSemester,
};
pub use credentials::CredentialProvider;
pub use snapshot_store::SnapshotStore;
