//! Incremental content-scan cache using SHA-256 for change detection.
//!
//! Performance characteristics:
//! - Parallel file hashing and token extraction via Rayon
//! - Read-once pattern: each content file is read once, then hashed and
//!   tokenized only on a cache miss
//!
//! The cache lives in `.csstrim/cache.json` next to the config file. It only
//! stores per-file token sets; the [`UsageIndex`] is still rebuilt from
//! scratch each run. Cache problems never fail a run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::content::{extract, read_content, Extractor, FileTokens, ScanOptions, UsageIndex};
use crate::error::{CsstrimError, CsstrimResult};
use crate::output::write_atomic;

/// Maximum cache file size (50MB)
const MAX_CACHE_SIZE_BYTES: usize = 50_000_000;

/// Current cache format version. Increment when cache format changes.
const CACHE_VERSION: u32 = 1;

const CSSTRIM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory holding the cache, relative to the config directory.
pub const CACHE_DIR: &str = ".csstrim";

/// Cached tokens of one content file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CachedFile {
    pub hash: String,
    pub extractor: Extractor,
    pub tokens: FileTokens,
}

/// Cache metadata for version checking.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CacheMetadata {
    pub cache_version: u32,
    pub csstrim_version: String,
    #[serde(default)]
    pub created_at: u64,
}

impl CacheMetadata {
    pub fn current() -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            cache_version: CACHE_VERSION,
            csstrim_version: CSSTRIM_VERSION.to_string(),
            created_at,
        }
    }

    /// Same format version and same major tool version.
    pub fn is_compatible(&self) -> bool {
        if self.cache_version != CACHE_VERSION {
            return false;
        }
        let current_major = CSSTRIM_VERSION.split('.').next().unwrap_or("0");
        let cached_major = self.csstrim_version.split('.').next().unwrap_or("0");
        current_major == cached_major
    }
}

/// The full cache model, keyed by content file path.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TokenCache {
    #[serde(default)]
    pub metadata: CacheMetadata,
    pub files: HashMap<String, CachedFile>,
}

#[inline]
fn hash_bytes(bytes: &[u8]) -> String {
    let mut sha = Sha256::new();
    sha.update(bytes);
    format!("{:x}", sha.finalize())
}

fn cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join("cache.json")
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Load the cache from `<root>/.csstrim/cache.json`.
///
/// Returns `None` when the file is missing, corrupted or from an
/// incompatible version.
pub fn load_cache(root: &Path) -> Option<TokenCache> {
    let path = cache_path(root);
    if !path.exists() {
        return None;
    }

    let text = fs::read_to_string(&path).ok()?;
    let cache: TokenCache = match serde_json::from_str(&text) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding corrupt cache");
            return None;
        }
    };

    if !cache.metadata.is_compatible() {
        info!(
            cached_version = cache.metadata.cache_version,
            cached_tool = %cache.metadata.csstrim_version,
            "cache version mismatch, rebuilding"
        );
        let _ = fs::remove_file(&path);
        return None;
    }

    Some(cache)
}

/// Save the cache atomically (temp file + rename).
pub fn save_cache(root: &Path, cache: &TokenCache) -> CsstrimResult<()> {
    let dir = root.join(CACHE_DIR);
    fs::create_dir_all(&dir)
        .map_err(|e| CsstrimError::cache(format!("cannot create {}: {}", dir.display(), e)))?;

    let path = cache_path(root);
    let json = serde_json::to_string(cache)
        .map_err(|e| CsstrimError::cache(format!("serialize failed: {}", e)))?;

    if json.len() > MAX_CACHE_SIZE_BYTES {
        warn!(
            limit_mb = MAX_CACHE_SIZE_BYTES / 1_000_000,
            "cache exceeds size limit, clearing"
        );
        let _ = fs::remove_file(&path);
        return Ok(());
    }

    write_atomic(&path, json.as_bytes())
        .map_err(|e| CsstrimError::cache(format!("cannot write {}: {}", path.display(), e)))
}

/// Read, hash, and tokenize one file unless the cache already has its hash.
fn process_file(
    file: &Path,
    options: &ScanOptions,
    old_cache: Option<&TokenCache>,
) -> CsstrimResult<(String, CachedFile)> {
    let content = read_content(file)?;
    let hash = hash_bytes(content.as_bytes());
    let extractor = options.extractor_for(file);
    let key = cache_key(file);

    if let Some(cached) = old_cache.and_then(|c| c.files.get(&key)) {
        if cached.hash == hash && cached.extractor == extractor {
            debug!(file = %file.display(), "content cache hit");
            return Ok((key, cached.clone()));
        }
    }

    let tokens = extract(extractor, &content);
    Ok((
        key,
        CachedFile {
            hash,
            extractor,
            tokens,
        },
    ))
}

/// Cached equivalent of [`crate::content::scan_content`].
///
/// Unreadable files still fail the scan. The refreshed cache only keeps the
/// files of this run and is saved on a best-effort basis.
pub fn incremental_scan(
    root: &Path,
    files: &[PathBuf],
    options: &ScanOptions,
    old_cache: Option<TokenCache>,
) -> CsstrimResult<UsageIndex> {
    let results = files
        .par_iter()
        .map(|file| process_file(file, options, old_cache.as_ref()))
        .collect::<CsstrimResult<Vec<_>>>()?;

    let index = UsageIndex::from_files(results.iter().map(|(_, cached)| &cached.tokens));

    let new_cache = TokenCache {
        metadata: CacheMetadata::current(),
        files: results.into_iter().collect(),
    };
    if let Err(e) = save_cache(root, &new_cache) {
        warn!(error = %e, "cache save failed");
    }

    Ok(index)
}
