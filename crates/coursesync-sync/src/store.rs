//! JSON file snapshot store
//!
//! Persists the snapshot as pretty-printed JSON. Saves go to a sibling
//! `.tmp` file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use coursesync_core::config::Config;
use coursesync_core::domain::Snapshot;
use coursesync_core::ports::SnapshotStore;
use tracing::{debug, warn};

/// [`SnapshotStore`] backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured `sync.snapshot_file`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sync.snapshot_file.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot persisted yet");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read snapshot {}", self.path.display()))
            }
        };

        match serde_json::from_slice(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Snapshot is corrupt, ignoring it");
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize snapshot")?;

        let tmp_path = {
            let mut p = self.path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Snapshot saved");
        Ok(())
    }
}
