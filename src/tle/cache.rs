//! Orbital record disk cache
//!
//! Every successful fetch is written through to one JSON file per catalog id,
//! so a cold start can serve records without network access.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tle::types::{CatalogId, OrbitalRecord};

/// Serialized cache entry stored as JSON on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub catalog_id: CatalogId,
    pub name: Option<String>,
    /// Provider payload, byte for byte.
    pub raw_elements: String,
    pub element_epoch: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl From<&OrbitalRecord> for CachedRecord {
    fn from(record: &OrbitalRecord) -> Self {
        Self {
            catalog_id: record.catalog_id.clone(),
            name: record.name.clone(),
            raw_elements: record.raw().to_string(),
            element_epoch: record.element_epoch,
            fetched_at: record.fetched_at,
        }
    }
}

impl CachedRecord {
    /// Rebuilds the in-memory record. The raw text is re-parsed so a cache
    /// file edited by hand cannot disagree with its own elements.
    pub fn into_record(self, generation: u64) -> anyhow::Result<OrbitalRecord> {
        OrbitalRecord::from_raw(
            self.catalog_id,
            self.raw_elements.into_bytes(),
            self.fetched_at,
            generation,
        )
    }
}

/// Orbital record disk cache manager
#[derive(Debug, Clone)]
pub struct TleCache {
    cache_dir: PathBuf,
}

impl TleCache {
    /// Create a cache in the platform cache directory
    ///
    /// - macOS: ~/Library/Caches/satcore/tle/
    /// - Linux: ~/.cache/satcore/tle/
    /// - Windows: %LOCALAPPDATA%\satcore\tle\
    pub fn new() -> anyhow::Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "satcore")
            .ok_or_else(|| anyhow::anyhow!("Failed to resolve cache directory"))?;
        Self::new_in_dir(proj_dirs.cache_dir().join("tle"))
    }

    /// Create a cache rooted at a specific directory
    pub fn new_in_dir(cache_dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("create cache dir {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Read a cached entry by catalog id
    ///
    /// Returns Ok(None) on a cache miss and Err if the file exists but cannot
    /// be read or parsed.
    pub fn read(&self, catalog_id: &CatalogId) -> anyhow::Result<Option<CachedRecord>> {
        let path = self.cache_path(catalog_id);
        if !path.exists() {
            return Ok(None);
        }
        read_entry(&path).map(Some)
    }

    /// Write an entry, replacing any previous file for the same catalog id
    pub fn write(&self, entry: &CachedRecord) -> anyhow::Result<()> {
        let path = self.cache_path(&entry.catalog_id);
        let contents = serde_json::to_string_pretty(entry)?;
        // Write-then-rename so a crash never leaves a truncated entry behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(())
    }

    /// Every readable entry in the cache directory. Unreadable files are
    /// logged and skipped.
    pub fn load_all(&self) -> anyhow::Result<Vec<CachedRecord>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_entry(&path) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable cache entry"),
            }
        }
        Ok(entries)
    }

    pub fn remove(&self, catalog_id: &CatalogId) -> anyhow::Result<()> {
        let path = self.cache_path(catalog_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Delete every cache entry.
    pub fn clear(&self) -> anyhow::Result<()> {
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let path = dir_entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Get the file path for a cached entry
    fn cache_path(&self, catalog_id: &CatalogId) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", file_stem(catalog_id)))
    }
}

fn read_entry(path: &Path) -> anyhow::Result<CachedRecord> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Filesystem-safe, collision-free stem for a caller-defined id.
fn file_stem(catalog_id: &CatalogId) -> String {
    let mut stem = String::with_capacity(catalog_id.as_str().len());
    for byte in catalog_id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::mock_data::{ISS_2008_TLE, ISS_2020_TLE};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(test_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "satcore-tle-cache-{}-{}-{}",
            test_name,
            std::process::id(),
            nanos
        ))
    }

    fn iss_record(raw: &str) -> OrbitalRecord {
        OrbitalRecord::from_raw(CatalogId::from(25544u32), raw.as_bytes().to_vec(), Utc::now(), 7)
            .expect("fixture should parse")
    }

    #[test]
    fn test_cache_write_and_read() {
        let cache = TleCache::new_in_dir(unique_temp_dir("write_and_read")).unwrap();
        let record = iss_record(ISS_2020_TLE);
        cache.write(&CachedRecord::from(&record)).expect("write should succeed");

        let cached = cache
            .read(&record.catalog_id)
            .expect("read should succeed")
            .expect("entry should exist");
        assert_eq!(cached.raw_elements.as_bytes(), ISS_2020_TLE.as_bytes());
        assert_eq!(cached.element_epoch, record.element_epoch);
        assert_eq!(cached.fetched_at, record.fetched_at);

        let restored = cached.into_record(8).unwrap();
        assert_eq!(restored.raw_bytes(), record.raw_bytes());
        assert_eq!(restored.generation, 8);
    }

    #[test]
    fn test_cache_miss() {
        let cache = TleCache::new_in_dir(unique_temp_dir("miss")).unwrap();
        let result = cache.read(&CatalogId::from("77777")).expect("read should not error");
        assert!(result.is_none());
    }

    #[test]
    fn test_cache_overwrite_replaces_entry() {
        let cache = TleCache::new_in_dir(unique_temp_dir("overwrite")).unwrap();
        cache.write(&CachedRecord::from(&iss_record(ISS_2008_TLE))).unwrap();
        cache.write(&CachedRecord::from(&iss_record(ISS_2020_TLE))).unwrap();

        let all = cache.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].raw_elements, ISS_2020_TLE);
    }

    #[test]
    fn test_cache_file_persistence() {
        let dir = unique_temp_dir("persistence");
        let cache = TleCache::new_in_dir(dir.clone()).unwrap();
        cache.write(&CachedRecord::from(&iss_record(ISS_2020_TLE))).unwrap();

        // New instance, as after an application restart
        let cache2 = TleCache::new_in_dir(dir).unwrap();
        let loaded = cache2.read(&CatalogId::from("25544")).unwrap().unwrap();
        assert_eq!(loaded.name.as_deref(), Some("ISS (ZARYA)"));
    }

    #[test]
    fn test_corrupt_entry_is_skipped() {
        let cache = TleCache::new_in_dir(unique_temp_dir("corrupt")).unwrap();
        cache.write(&CachedRecord::from(&iss_record(ISS_2020_TLE))).unwrap();
        fs::write(cache.dir().join("garbage.json"), "{ not json").unwrap();

        let all = cache.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(cache.read(&CatalogId::from("garbage")).is_err());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = TleCache::new_in_dir(unique_temp_dir("clear")).unwrap();
        let record = iss_record(ISS_2020_TLE);
        cache.write(&CachedRecord::from(&record)).unwrap();
        cache.remove(&record.catalog_id).unwrap();
        assert!(cache.read(&record.catalog_id).unwrap().is_none());

        cache.write(&CachedRecord::from(&record)).unwrap();
        cache.clear().unwrap();
        assert!(cache.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_file_stem_is_safe() {
        assert_eq!(file_stem(&CatalogId::from("25544")), "25544");
        assert_eq!(file_stem(&CatalogId::from("a/b")), "a_2fb");
        assert_ne!(
            file_stem(&CatalogId::from("a_b")),
            file_stem(&CatalogId::from("a.b"))
        );
    }
}
