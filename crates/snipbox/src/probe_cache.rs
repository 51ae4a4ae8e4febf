//! Thread-safe cache for runtime probe results.
//!
//! Entries are keyed by the binary path and its modification time, so
//! upgrading an interpreter in place invalidates its entry.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use dashmap::DashMap;

use crate::error::ProbeError;
use crate::probe::{Probe, RuntimeInfo};

/// Cache shared by the built-in runtimes.
pub static PROBE_CACHE: LazyLock<ProbeCache> = LazyLock::new(ProbeCache::new);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    binary: PathBuf,
    modified: SystemTime,
}

impl CacheKey {
    fn for_binary(binary: &Path) -> Result<Self, ProbeError> {
        let metadata = std::fs::metadata(binary)?;
        Ok(Self {
            binary: binary.to_path_buf(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }
}

#[derive(Debug, Default)]
pub struct ProbeCache {
    cache: DashMap<CacheKey, RuntimeInfo>,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_probe<P: Probe + ?Sized>(
        &self,
        probe: &P,
        binary: &Path,
    ) -> Result<RuntimeInfo, ProbeError> {
        let key = CacheKey::for_binary(binary)?;

        if let Some(info) = self.cache.get(&key) {
            return Ok(info.clone());
        }

        let info = probe.probe(binary)?;
        tracing::debug!(
            runtime = probe.name(),
            binary = %binary.display(),
            version = info.version.as_deref().unwrap_or("unknown"),
            "probed runtime"
        );
        self.cache.insert(key, info.clone());
        Ok(info)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
