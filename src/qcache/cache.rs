//! On-disk q-cache: a single JSON file mapping a content hash of the
//! canonical cache key encoding to the per-constraint Monte Carlo sample
//! sequences (`spec.md` §3 "Q-Cache Entry", §6 "Persisted state").
//!
//! Writes are atomic (`tempfile`'s write-temp-then-rename, the same pattern
//! the teacher crate's `animation/recorder.rs` uses for animation files);
//! reads tolerate concurrent writers racing (last rename wins) and treat a
//! corrupt or undecodable file as a cache miss rather than a hard error,
//! per `spec.md` §4.4 and §7's "CacheIOError (soft): log and recompute".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::Parameters;
use crate::error::CacheError;

/// Canonical cache key: image shape, ordered kernel sizes, resolvent kind,
/// Monte Carlo step count, `penalized_scan` flag (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    height: u32,
    width: u32,
    kernel_sizes: Vec<u32>,
    resolvent_tag: u8,
    resolvent_param_bits: u32,
    monte_carlo_steps: u32,
    penalized_scan: u8,
}

impl CacheKey {
    pub fn new(params: &Parameters) -> Self {
        Self {
            height: params.height as u32,
            width: params.width as u32,
            kernel_sizes: params.kernel_sizes.iter().map(|&h| h as u32).collect(),
            resolvent_tag: params.resolvent.cache_tag(),
            resolvent_param_bits: params.resolvent.cache_param().to_bits(),
            monte_carlo_steps: params.monte_carlo_steps as u32,
            penalized_scan: params.penalized_scan as u8,
        }
    }

    /// Little-endian concatenation per `spec.md` §6: H, W (u32), kernel
    /// count (u32), each h_i (u32), resolvent tag (u8) + param (f32), M
    /// (u32), penalized_scan flag (u8).
    fn canonical_encoding(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 * (4 + self.kernel_sizes.len()) + 1 + 4 + 4 + 1);
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&(self.kernel_sizes.len() as u32).to_le_bytes());
        for &h in &self.kernel_sizes {
            buf.extend_from_slice(&h.to_le_bytes());
        }
        buf.push(self.resolvent_tag);
        buf.extend_from_slice(&self.resolvent_param_bits.to_le_bytes());
        buf.extend_from_slice(&self.monte_carlo_steps.to_le_bytes());
        buf.push(self.penalized_scan);
        buf
    }

    /// Hex-encoded SHA-256 of the canonical encoding; used as the JSON map
    /// key so the physical cache file never has to parse the key back out.
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_encoding());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// A loaded (or freshly-empty) q-cache, keyed by [`CacheKey::content_hash`].
#[derive(Default)]
pub struct QCacheStore {
    path: PathBuf,
    entries: HashMap<String, Vec<Vec<f64>>>,
}

impl QCacheStore {
    /// Load the cache file at `path`, or start an empty one if it does not
    /// exist yet. Corrupt contents are treated as empty (soft failure,
    /// logged by the caller through [`crate::error::CacheError`]'s
    /// `Display`).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Vec<f64>>> {
        self.entries.get(&key.content_hash()).cloned()
    }

    /// Insert the entry and persist the whole store atomically: write to a
    /// temp file in the same directory, then rename over the target path.
    pub fn put_and_persist(
        &mut self,
        key: &CacheKey,
        samples: Vec<Vec<f64>>,
    ) -> Result<(), CacheError> {
        self.entries.insert(key.content_hash(), samples);
        self.persist()
    }

    fn persist(&self) -> Result<(), CacheError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string(&self.entries)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, json.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> Parameters {
        let mut p = Parameters::default();
        p.width = 32;
        p.height = 32;
        p.kernel_sizes = vec![3, 7];
        p.monte_carlo_steps = 50;
        p
    }

    #[test]
    fn same_key_fields_hash_identically() {
        let a = CacheKey::new(&sample_params());
        let b = CacheKey::new(&sample_params());
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn different_kernel_sizes_hash_differently() {
        let a = CacheKey::new(&sample_params());
        let mut params = sample_params();
        params.kernel_sizes = vec![3, 9];
        let b = CacheKey::new(&params);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn round_trip_write_then_read_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qcache.json");

        let key = CacheKey::new(&sample_params());
        let samples = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];

        let mut store = QCacheStore::load(&path);
        store.put_and_persist(&key, samples.clone()).unwrap();

        let reloaded = QCacheStore::load(&path);
        assert_eq!(reloaded.get(&key), Some(samples));
    }

    #[test]
    fn corrupt_file_is_treated_as_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qcache.json");
        std::fs::write(&path, b"not valid json").unwrap();

        let store = QCacheStore::load(&path);
        let key = CacheKey::new(&sample_params());
        assert_eq!(store.get(&key), None);
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let store = QCacheStore::load("/nonexistent/path/to/qcache.json");
        let key = CacheKey::new(&sample_params());
        assert_eq!(store.get(&key), None);
    }
}
