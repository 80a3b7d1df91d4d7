//! File scanner for discovering Python sources
//!
//! Resolves the project root, walks it and reports progress.

use crate::config::CompassConfig;
use crate::core::ScanEvent;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::path::PathBuf;

/// A source file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Project-relative, `/`-separated
    pub path: String,
    pub absolute: PathBuf,
}

/// Notify helper for optional sender
pub(crate) fn notify(tx: &Option<Sender<ScanEvent>>, event: ScanEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}

/// Discover Python files according to configuration
///
/// Returns the canonical project root and the files beneath it, sorted by
/// relative path.
pub fn discover_files(
    config: &CompassConfig,
    tx: &Option<Sender<ScanEvent>>,
) -> Result<(PathBuf, Vec<DiscoveredFile>)> {
    notify(tx, ScanEvent::StartScanning);

    let root = config
        .scan
        .path
        .canonicalize()
        .with_context(|| format!("Failed to find directory: {:?}", config.scan.path))?;

    let paths = crate::fs::walk_python_files(
        &root,
        &config.scan.ignore_patterns,
        config.scan.max_file_size,
    )?;

    let mut files: Vec<DiscoveredFile> = paths
        .into_iter()
        .filter_map(|absolute| {
            let path = crate::fs::relative_key(&root, &absolute)?;
            Some(DiscoveredFile { path, absolute })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::debug!(files = files.len(), root = %root.display(), "discovery finished");
    notify(tx, ScanEvent::FilesFound(files.len()));
    Ok((root, files))
}
