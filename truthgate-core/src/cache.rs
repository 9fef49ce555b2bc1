//! Last-known-good snapshot cache under `.truthgate/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Dimension, Metrics, StatusSnapshot};
use crate::error::Result;
use crate::fs::FileSystem;

/// Cache location relative to the project root.
pub const CACHE_FILE: &str = ".truthgate/status-cache.json";

/// One dimension's last live metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// When the metrics were measured.
    pub collected_at: String,
    /// The metrics.
    pub metrics: Metrics,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

/// Reads and writes the snapshot cache through the filesystem port.
pub struct SnapshotCache<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
}

impl<'a> SnapshotCache<'a> {
    /// Cache for the project at `root`.
    pub fn new(fs: &'a dyn FileSystem, root: &Path) -> Self {
        Self {
            fs,
            path: root.join(CACHE_FILE),
        }
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached entries keyed by dimension.
    ///
    /// A missing cache is empty; a corrupt one is logged and treated as empty.
    pub fn load(&self) -> BTreeMap<Dimension, CacheEntry> {
        if !self.fs.exists(&self.path) {
            return BTreeMap::new();
        }
        let parsed = self
            .fs
            .read_to_string(&self.path)
            .and_then(|text| Ok(serde_json::from_str::<CacheFile>(&text)?));
        match parsed {
            Ok(file) => file
                .entries
                .into_iter()
                .map(|entry| (entry.metrics.dimension(), entry))
                .collect(),
            Err(err) => {
                log::warn!("ignoring unreadable cache {}: {err}", self.path.display());
                BTreeMap::new()
            }
        }
    }

    /// Merge the live snapshots into the cache and write it back.
    ///
    /// Cached and default snapshots never overwrite a cached entry.
    pub fn store(&self, snapshots: &[StatusSnapshot], collected_at: &str) -> Result<()> {
        let mut entries = self.load();
        for snapshot in snapshots.iter().filter(|snapshot| snapshot.is_live()) {
            entries.insert(
                snapshot.dimension(),
                CacheEntry {
                    collected_at: collected_at.to_string(),
                    metrics: snapshot.metrics.clone(),
                },
            );
        }
        let file = CacheFile {
            entries: entries.into_values().collect(),
        };
        self.fs
            .write(&self.path, &serde_json::to_string_pretty(&file)?)?;
        log::debug!("wrote snapshot cache to {}", self.path.display());
        Ok(())
    }
}
