//! On-disk copy of the remote catalog index.
//!
//! Lets the repository show remote catalogs while offline. A missing or unreadable cache
//! is treated as empty.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::model::CatalogRemote;
use crate::error::Result;

/// Last successfully fetched remote index, kept on disk as JSON.
///
/// Without a path the cache only lives as long as the repository's in-memory collection.
#[derive(Debug, Clone, Default)]
pub struct CatalogCache {
    path: Option<PathBuf>,
}

impl CatalogCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A cache that stores nothing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the cached catalogs; a missing or unreadable cache is empty.
    pub async fn load(&self) -> Vec<CatalogRemote> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read catalog cache");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(catalogs) => catalogs,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt catalog cache");
                Vec::new()
            }
        }
    }

    /// Replaces the cached catalogs, sorted by language then name.
    ///
    /// The file is written next to its final location and renamed over it, so readers
    /// never see a half-written cache.
    pub async fn store(&self, catalogs: &[CatalogRemote]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut sorted = catalogs.to_vec();
        sorted.sort_by(|a, b| (&a.lang, &a.name).cmp(&(&b.lang, &b.name)));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&sorted)?).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), count = sorted.len(), "Stored catalog cache");
        Ok(())
    }
}
