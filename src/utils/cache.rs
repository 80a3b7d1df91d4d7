use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{SourceFile, Symbol};

/// Bumped whenever the on-disk layout of [`SourceFile`] changes.
pub const CACHE_VERSION: u32 = 1;

/// Index file name inside the cache directory.
pub const CACHE_FILE: &str = "index.json";

#[derive(Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    files: BTreeMap<String, SourceFile>,
}

/// A symbol together with the file that declares it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolHit {
    pub path: String,
    #[serde(flatten)]
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
}

/// Extracted files keyed by project-relative path.
///
/// Workers read and write concurrently during a batch; the whole map is
/// written back as one JSON document afterwards.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: DashMap<String, SourceFile>,
    location: Option<PathBuf>,
}

impl FileCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the cache stored in `dir`. A missing, unreadable or outdated
    /// index starts empty.
    pub fn load(dir: &Path) -> Self {
        let location = dir.join(CACHE_FILE);
        let cache = Self {
            entries: DashMap::new(),
            location: Some(location.clone()),
        };

        let content = match fs::read_to_string(&location) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return cache,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache {}: {}", location.display(), e);
                return cache;
            }
        };

        match serde_json::from_str::<CacheDocument>(&content) {
            Ok(doc) if doc.version == CACHE_VERSION => {
                for (path, file) in doc.files {
                    cache.entries.insert(path, file);
                }
                tracing::debug!(files = cache.len(), "cache loaded from {}", location.display());
            }
            Ok(doc) => {
                tracing::warn!(
                    found = doc.version,
                    expected = CACHE_VERSION,
                    "cache format changed, starting fresh"
                );
            }
            Err(e) => {
                tracing::warn!("corrupt cache {}: {}", location.display(), e);
            }
        }
        cache
    }

    pub fn save(&self) -> Result<()> {
        let Some(location) = &self.location else {
            return Ok(());
        };
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }

        let doc = CacheDocument {
            version: CACHE_VERSION,
            files: self
                .entries
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        };
        let content = serde_json::to_string(&doc)?;

        let staging = location.with_extension("json.tmp");
        fs::write(&staging, content)
            .with_context(|| format!("Failed to write cache {}", staging.display()))?;
        fs::rename(&staging, location)
            .with_context(|| format!("Failed to replace cache {}", location.display()))?;
        Ok(())
    }

    /// Inserts or replaces the record for `file.path`.
    pub fn store(&self, file: SourceFile) {
        self.entries.insert(file.path.clone(), file);
    }

    /// Returns a clone so no shard lock outlives the call.
    pub fn get(&self, path: &str) -> Option<SourceFile> {
        self.entries.get(path).map(|r| r.value().clone())
    }

    /// Whether `path` is cached with exactly this content hash.
    pub fn is_cached(&self, path: &str, hash: &str) -> bool {
        self.entries
            .get(path)
            .is_some_and(|r| r.value().content_hash == hash)
    }

    pub fn remove(&self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drops records whose path is not in `keep`. Returns how many went.
    pub fn retain_paths(&self, keep: &[String]) -> usize {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let before = self.entries.len();
        self.entries.retain(|path, _| keep.contains(path.as_str()));
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every record, ordered by path.
    pub fn all(&self) -> Vec<SourceFile> {
        let mut files: Vec<SourceFile> = self.entries.iter().map(|r| r.value().clone()).collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Symbols named exactly `name`, ordered by path then line.
    pub fn find_symbol(&self, name: &str) -> Vec<SymbolHit> {
        self.collect_symbols(|symbol| symbol.name == name)
    }

    /// Symbols whose name contains `pattern`, ignoring case.
    pub fn search_symbols(&self, pattern: &str) -> Vec<SymbolHit> {
        let needle = pattern.to_lowercase();
        self.collect_symbols(|symbol| symbol.name.to_lowercase().contains(&needle))
    }

    fn collect_symbols(&self, matches: impl Fn(&Symbol) -> bool) -> Vec<SymbolHit> {
        let mut hits: Vec<SymbolHit> = self
            .entries
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .symbols
                    .iter()
                    .filter(|s| matches(s))
                    .map(|s| SymbolHit {
                        path: entry.key().clone(),
                        symbol: s.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        hits.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.symbol.line_start.cmp(&b.symbol.line_start))
        });
        hits
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            let file = entry.value();
            stats.total_files += 1;
            stats.total_symbols += file.symbols.len();
            *stats.by_language.entry(file.language.clone()).or_default() += 1;
            for symbol in &file.symbols {
                *stats.by_kind.entry(symbol.kind.to_string()).or_default() += 1;
            }
        }
        stats
    }
}
