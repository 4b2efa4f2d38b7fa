//! Remote catalog port (driven/secondary port)
//!
//! This module defines the typed accessors the sync pipeline uses to read
//! the remote course catalog. Wire format, HTTP transport and bearer
//! handling are the adapter's concern.
//!
//! ## Design Notes
//!
//! - Every call fails with one of a fixed set of [`CatalogError`] kinds so
//!   orchestrators can classify failures without string matching.
//! - The `Remote*` structs are port-level DTOs, not domain entities;
//!   discovery units are responsible for mapping them to tree nodes.
//! - Uses `#[async_trait]` for async trait methods.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::EpochSeconds;

// ============================================================================
// CatalogError
// ============================================================================

/// Failure kinds of a catalog call
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The bearer token was rejected
    #[error("unauthorized: bearer token rejected")]
    Unauthorized,

    /// The entity exists but is no longer visible to this user
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The entity disappeared remotely
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote could not be reached
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A response the adapter should never produce (malformed payload, ...)
    #[error("unexpected catalog failure: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl CatalogError {
    /// Forbidden/not-found: the entity is pruned, the run continues
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::NotFound(_))
    }

    /// Unauthorized/connection failure: the current run stops
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::ConnectionFailed(_))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Document content as delivered by the catalog
pub type DocumentStream = Pin<Box<dyn AsyncRead + Send>>;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSemester {
    pub id: String,
    pub title: String,
    pub begin: EpochSeconds,
    pub end: EpochSeconds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCourse {
    pub id: String,
    pub title: String,
    pub start: EpochSeconds,
    pub duration: i64,
    pub type_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub created: EpochSeconds,
    pub changed: EpochSeconds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    /// Folder the document lives in
    pub folder_id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub description: String,
    pub changed: EpochSeconds,
    pub size: u64,
}

/// Direct children of one remote folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderContents {
    pub folders: Vec<RemoteFolder>,
    pub documents: Vec<RemoteDocument>,
}

// ============================================================================
// CatalogApi trait
// ============================================================================

/// Port trait for the remote course catalog
///
/// ## Implementation Notes
///
/// - Implementations attach the bearer obtained from the
///   [`CredentialProvider`](super::CredentialProvider) themselves.
/// - Transport errors must map to [`CatalogError::ConnectionFailed`],
///   HTTP 401/403/404 to `Unauthorized`/`Forbidden`/`NotFound`.
#[async_trait::async_trait]
pub trait CatalogApi: Send + Sync {
    /// All semesters visible to the user
    async fn list_semesters(&self) -> CatalogResult<Vec<RemoteSemester>>;

    /// Courses the user is enrolled in for one semester
    async fn list_courses(&self, semester_id: &str) -> CatalogResult<Vec<RemoteCourse>>;

    /// Children of a folder; `folder_id = None` lists the course's top folder
    async fn list_folder_contents(
        &self,
        course_id: &str,
        folder_id: Option<&str>,
    ) -> CatalogResult<FolderContents>;

    /// Documents of a course changed after `since`
    async fn list_changed_documents(
        &self,
        course_id: &str,
        since: EpochSeconds,
    ) -> CatalogResult<Vec<RemoteDocument>>;

    /// Content of one document
    async fn download_document(&self, document_id: &str) -> CatalogResult<DocumentStream>;
}
